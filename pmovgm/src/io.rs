//! Virtual file view handed to the Vorbis decoder.
//!
//! The decoder only ever sees a window `[start, start + size)` of the
//! underlying [`ByteSource`], with the container's obfuscation undone on the
//! fly. Access goes through the four primitive operations of [`IoCallbacks`];
//! [`CallbackStream`] wraps them into `std::io::Read + Seek` for decoders that
//! consume standard readers.

use std::{
    fmt,
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};

use tracing::trace;

use crate::{
    source::{ByteSource, read_full},
    transform::ByteTransform,
};

/// Shared, replaceable callback set.
pub type SharedCallbacks = Arc<dyn IoCallbacks + Send + Sync>;

/// Origin of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

/// Seek target outside the virtual stream; the decoder's "unseekable" signal.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("seek to {target} is outside the virtual stream of {size} bytes")]
pub struct OutOfRange {
    pub target: i128,
    pub size: u64,
}

/// Per-session state: one owned handle plus the window and cursor over it.
pub struct VirtualFile<'a> {
    source: Box<dyn ByteSource + 'a>,
    start: u64,
    size: u64,
    offset: u64,
    transform: ByteTransform,
}

impl<'a> VirtualFile<'a> {
    pub fn new(
        source: Box<dyn ByteSource + 'a>,
        start: u64,
        size: u64,
        transform: ByteTransform,
    ) -> Self {
        Self {
            source,
            start,
            size,
            offset: 0,
            transform,
        }
    }

    /// Absolute offset of virtual byte 0.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Length of the virtual stream.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current virtual cursor.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn transform(&self) -> ByteTransform {
        self.transform
    }

    pub fn source(&self) -> &dyn ByteSource {
        self.source.as_ref()
    }

    /// Bytes left between the cursor and the end of the virtual stream.
    pub fn remaining(&self) -> u64 {
        self.size - self.offset
    }

    /// Moves the cursor; fails without moving it when outside `[0, size]`.
    pub fn set_offset(&mut self, target: i128) -> Result<u64, OutOfRange> {
        if target < 0 || target > self.size as i128 {
            return Err(OutOfRange {
                target,
                size: self.size,
            });
        }
        self.offset = target as u64;
        Ok(self.offset)
    }

    /// Reads raw (untransformed) bytes at the cursor without moving it.
    pub fn read_raw(&self, buf: &mut [u8]) -> io::Result<usize> {
        read_full(self.source.as_ref(), self.start + self.offset, buf)
    }
}

impl fmt::Debug for VirtualFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFile")
            .field("source", &self.source.name())
            .field("start", &self.start)
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("transform", &self.transform)
            .finish()
    }
}

/// The primitive operations a decoder uses to pull bytes.
pub trait IoCallbacks {
    /// Reads up to `count` items of `size` bytes; returns whole items read.
    fn read(
        &self,
        file: &mut VirtualFile<'_>,
        buf: &mut [u8],
        size: usize,
        count: usize,
    ) -> io::Result<usize>;

    fn seek(
        &self,
        file: &mut VirtualFile<'_>,
        offset: i64,
        whence: Whence,
    ) -> Result<u64, OutOfRange>;

    fn tell(&self, file: &VirtualFile<'_>) -> u64;

    fn close(&self, file: &mut VirtualFile<'_>) -> io::Result<()>;
}

/// Default callbacks: clamped windowed reads with the file's transform applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualIoBridge;

impl IoCallbacks for VirtualIoBridge {
    fn read(
        &self,
        file: &mut VirtualFile<'_>,
        buf: &mut [u8],
        size: usize,
        count: usize,
    ) -> io::Result<usize> {
        if size == 0 {
            return Ok(0);
        }
        let requested = size.saturating_mul(count).min(buf.len());
        let max_bytes = (requested as u64).min(file.remaining()) as usize;

        let bytes_read = file.read_raw(&mut buf[..max_bytes])?;
        let items = bytes_read / size;
        let consumed = items * size;

        // offset is still the virtual position of buf[0]
        file.transform.apply(&mut buf[..consumed], file.offset);
        file.offset += consumed as u64;

        Ok(items)
    }

    fn seek(
        &self,
        file: &mut VirtualFile<'_>,
        offset: i64,
        whence: Whence,
    ) -> Result<u64, OutOfRange> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => file.offset,
            Whence::End => file.size,
        };
        let target = base as i128 + offset as i128;
        trace!(position = target, size = file.size, "virtual seek");
        file.set_offset(target)
    }

    fn tell(&self, file: &VirtualFile<'_>) -> u64 {
        file.offset
    }

    fn close(&self, _file: &mut VirtualFile<'_>) -> io::Result<()> {
        // the handle is released when the owning session drops the file
        Ok(())
    }
}

/// A [`VirtualFile`] bound to a callback set, usable as a standard reader.
pub struct CallbackStream<'a> {
    file: VirtualFile<'a>,
    callbacks: SharedCallbacks,
}

impl<'a> CallbackStream<'a> {
    pub fn new(file: VirtualFile<'a>, callbacks: SharedCallbacks) -> Self {
        Self { file, callbacks }
    }

    /// Binds `file` to the default [`VirtualIoBridge`].
    pub fn with_default_callbacks(file: VirtualFile<'a>) -> Self {
        Self::new(file, Arc::new(VirtualIoBridge))
    }

    pub fn file(&self) -> &VirtualFile<'a> {
        &self.file
    }

    pub fn tell(&self) -> u64 {
        self.callbacks.tell(&self.file)
    }
}

impl fmt::Debug for CallbackStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackStream")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl Read for CallbackStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        self.callbacks.read(&mut self.file, buf, 1, len)
    }
}

impl Seek for CallbackStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?,
                Whence::Set,
            ),
            SeekFrom::Current(n) => (n, Whence::Current),
            SeekFrom::End(n) => (n, Whence::End),
        };
        self.callbacks
            .seek(&mut self.file, offset, whence)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
    }
}

impl Drop for CallbackStream<'_> {
    fn drop(&mut self) {
        let _ = self.callbacks.close(&mut self.file);
    }
}
