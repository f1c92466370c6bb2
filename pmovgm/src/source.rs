//! Byte sources the loader reads containers from.
//!
//! A [`ByteSource`] is a positioned-read handle over a file or an archive
//! member. The loader never assumes a handle can be shared across passes: the
//! validation pass borrows the caller's handle and the committed stream gets a
//! fresh one obtained through [`ByteSource::open`].

use std::{
    fs::File,
    io::{self, BufReader, Read, Seek},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Default read buffer for file-backed sources.
pub const DEFAULT_BUFFER_SIZE: usize = 0x8000;

/// A seekable, readable handle to the raw bytes of one logical resource.
pub trait ByteSource: Send + Sync {
    /// Reads up to `buf.len()` bytes at absolute `offset`. Returns 0 at EOF.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length of the underlying resource.
    fn size(&self) -> u64;

    /// Logical name, used for extension checks and reopening.
    fn name(&self) -> &str;

    /// Opens another independent handle to the resource called `name`.
    fn open(&self, name: &str) -> io::Result<Self>
    where
        Self: Sized;
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&self, _name: &str) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "borrowed byte sources cannot be reopened",
        ))
    }
}

/// Reads until `buf` is full or the source reports EOF.
pub(crate) fn read_full<S: ByteSource + ?Sized>(
    source: &S,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match source.read_at(offset + total as u64, &mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}

/// A file on disk, read through a buffered handle.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
    buffer_size: usize,
    reader: Mutex<BufReader<File>>,
}

impl FileSource {
    pub fn open_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(path: impl AsRef<Path>, buffer_size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            path,
            size,
            buffer_size,
            reader: Mutex::new(BufReader::with_capacity(buffer_size, file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| io::Error::other("file source lock poisoned"))?;
        let position = reader.stream_position()?;
        if position != offset {
            // keeps the buffer when the target is already inside it
            reader.seek_relative(offset as i64 - position as i64)?;
        }
        reader.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, name: &str) -> io::Result<Self> {
        Self::with_buffer_size(name, self.buffer_size)
    }
}

/// An in-memory resource, such as an archive member already extracted.
///
/// Clones share the same bytes; reopening by the same name hands out another
/// handle over them.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, name: &str) -> io::Result<Self> {
        if name != self.name {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory resource named {name}"),
            ));
        }
        Ok(self.clone())
    }
}
