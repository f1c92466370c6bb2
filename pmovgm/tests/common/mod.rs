#![allow(dead_code)]

use std::{
    io::{Read, Seek, SeekFrom},
    sync::{Arc, Mutex},
};

use ogg::{PacketWriteEndInfo, PacketWriter};
use pmovgm::{BitstreamDecoder, BitstreamInfo, DecodeError, DecoderSession};

/// Stands in for a Vorbis decoder: accepts any stream starting with `OggS`
/// and reports a fixed format, comment list and length.
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    pub channels: u8,
    pub sample_rate: u32,
    pub comments: Vec<String>,
    pub total_samples: u64,
    /// Bytes the committed session read, after deobfuscation.
    pub committed: Arc<Mutex<Vec<u8>>>,
    pub passes: Arc<Mutex<Vec<&'static str>>>,
}

impl Default for ScriptedDecoder {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44_100,
            comments: Vec::new(),
            total_samples: 441_000,
            committed: Arc::default(),
            passes: Arc::default(),
        }
    }
}

impl ScriptedDecoder {
    pub fn with_comments(comments: &[&str]) -> Self {
        Self {
            comments: comments.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn committed_bytes(&self) -> Vec<u8> {
        self.committed.lock().unwrap().clone()
    }

    pub fn passes(&self) -> Vec<&'static str> {
        self.passes.lock().unwrap().clone()
    }
}

pub struct ScriptedSession {
    info: BitstreamInfo,
    comments: Vec<String>,
    total_samples: u64,
}

impl DecoderSession for ScriptedSession {
    fn info(&self, bitstream: usize) -> Option<BitstreamInfo> {
        (bitstream == 0).then_some(self.info)
    }

    fn comments(&self, _bitstream: usize) -> Vec<String> {
        self.comments.clone()
    }

    fn pcm_total(&mut self) -> Result<u64, DecodeError> {
        Ok(self.total_samples)
    }
}

fn read_stream<R: Read + Seek>(mut reader: R) -> Result<Vec<u8>, DecodeError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    if !data.starts_with(b"OggS") {
        return Err(DecodeError::Vorbis("capture pattern not found".into()));
    }
    Ok(data)
}

impl BitstreamDecoder for ScriptedDecoder {
    type Session<R: Read + Seek> = ScriptedSession;

    fn test<R: Read + Seek>(&self, reader: R) -> Result<(), DecodeError> {
        self.passes.lock().unwrap().push("test");
        read_stream(reader).map(drop)
    }

    fn open<R: Read + Seek>(&self, reader: R) -> Result<ScriptedSession, DecodeError> {
        self.passes.lock().unwrap().push("open");
        let data = read_stream(reader)?;
        *self.committed.lock().unwrap() = data;
        Ok(ScriptedSession {
            info: BitstreamInfo {
                channels: self.channels,
                sample_rate: self.sample_rate,
            },
            comments: self.comments.clone(),
            total_samples: self.total_samples,
        })
    }
}

/// A plain Ogg stream body: capture pattern followed by filler.
pub fn plain_ogg(len: usize) -> Vec<u8> {
    let mut data = b"OggS".to_vec();
    data.extend((0..len.saturating_sub(4)).map(|i| (i * 7 + 3) as u8));
    data
}

/// LSB-first bit packer, as Vorbis headers are laid out.
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    fn put(&mut self, value: u32, bits: u32) {
        for i in 0..bits {
            if self.used == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << self.used;
            }
            self.used = (self.used + 1) % 8;
        }
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.put(*byte as u32, 8);
        }
    }
}

fn ident_header(channels: u8, sample_rate: u32) -> Vec<u8> {
    let mut out = vec![1];
    out.extend_from_slice(b"vorbis");
    out.extend_from_slice(&0u32.to_le_bytes());
    out.push(channels);
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&[0; 12]);
    // blocksizes 256 and 2048
    out.push(0xb8);
    out.push(1);
    out
}

fn comment_header(comments: &[&str]) -> Vec<u8> {
    let vendor = b"pmovgm tests";
    let mut out = vec![3];
    out.extend_from_slice(b"vorbis");
    out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    out.extend_from_slice(vendor);
    out.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for comment in comments {
        out.extend_from_slice(&(comment.len() as u32).to_le_bytes());
        out.extend_from_slice(comment.as_bytes());
    }
    out.push(1);
    out
}

/// Smallest decodable setup: one 2-entry codebook, one empty floor 1, one
/// residue without books, one mapping and one short-block mode.
fn setup_header() -> Vec<u8> {
    let mut w = BitWriter::default();
    w.put(5, 8);
    w.put_bytes(b"vorbis");

    w.put(0, 8); // codebooks - 1
    w.put(0x564342, 24);
    w.put(1, 16); // dimensions
    w.put(2, 24); // entries
    w.put(0, 1); // ordered
    w.put(0, 1); // sparse
    w.put(0, 5); // length 1
    w.put(0, 5); // length 1
    w.put(0, 4); // no lookup

    w.put(0, 6); // time transforms - 1
    w.put(0, 16);

    w.put(0, 6); // floors - 1
    w.put(1, 16); // floor type 1
    w.put(0, 5); // partitions
    w.put(0, 2); // multiplier - 1
    w.put(8, 4); // rangebits

    w.put(0, 6); // residues - 1
    w.put(0, 16); // residue type 0
    w.put(0, 24); // begin
    w.put(0, 24); // end
    w.put(0, 24); // partition size - 1
    w.put(0, 6); // classifications - 1
    w.put(0, 8); // classbook
    w.put(0, 3); // cascade low bits
    w.put(0, 1); // no high bits

    w.put(0, 6); // mappings - 1
    w.put(0, 16); // mapping type 0
    w.put(0, 1); // single submap
    w.put(0, 1); // no coupling
    w.put(0, 2); // reserved
    w.put(0, 8); // submap time
    w.put(0, 8); // submap floor
    w.put(0, 8); // submap residue

    w.put(0, 6); // modes - 1
    w.put(0, 1); // short block
    w.put(0, 16); // window type
    w.put(0, 16); // transform type
    w.put(0, 8); // mapping

    w.put(1, 1); // framing
    w.bytes
}

/// A complete Ogg Vorbis stream: the three headers, then one audio packet on
/// a final page whose granule position is `total_samples`.
pub fn vorbis_stream(
    channels: u8,
    sample_rate: u32,
    comments: &[&str],
    total_samples: u64,
) -> Vec<u8> {
    const SERIAL: u32 = 0x5eed;
    let mut writer = PacketWriter::new(Vec::new());
    writer
        .write_packet(
            ident_header(channels, sample_rate).into_boxed_slice(),
            SERIAL,
            PacketWriteEndInfo::EndPage,
            0,
        )
        .unwrap();
    writer
        .write_packet(
            comment_header(comments).into_boxed_slice(),
            SERIAL,
            PacketWriteEndInfo::NormalPacket,
            0,
        )
        .unwrap();
    writer
        .write_packet(
            setup_header().into_boxed_slice(),
            SERIAL,
            PacketWriteEndInfo::EndPage,
            0,
        )
        .unwrap();
    writer
        .write_packet(
            vec![0u8].into_boxed_slice(),
            SERIAL,
            PacketWriteEndInfo::EndStream,
            total_samples,
        )
        .unwrap();
    writer.into_inner()
}
