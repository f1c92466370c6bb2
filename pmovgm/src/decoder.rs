//! The external Vorbis decoder seam.
//!
//! The loader never decodes audio. It only asks a decoder to validate a byte
//! stream, open it, and report channel count, sample rate, comment tags and
//! total length. [`LewtonDecoder`] is the default implementation; tests and
//! embedders can plug in their own.

use std::io::{self, Read, Seek, SeekFrom};

use lewton::inside_ogg::OggStreamReader;
use tracing::{debug, trace};

use crate::{OGG_MAGIC, error::DecodeError};

/// Logical bitstream the loader reads info from.
pub const DEFAULT_BITSTREAM: usize = 0;

/// Default window used when scanning backwards for the last Ogg page.
pub const DEFAULT_SCAN_CHUNK_SIZE: usize = 65_536;

const PAGE_HEADER_SIZE: usize = 27;

/// Format of one logical bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitstreamInfo {
    pub channels: u8,
    pub sample_rate: u32,
}

/// An open decoder session. Dropping it releases the reader it owns.
pub trait DecoderSession {
    fn info(&self, bitstream: usize) -> Option<BitstreamInfo>;

    /// Comment tags as `key=value` strings, in stream order.
    fn comments(&self, bitstream: usize) -> Vec<String>;

    /// Total PCM frames over the whole stream.
    fn pcm_total(&mut self) -> Result<u64, DecodeError>;
}

/// Opens Vorbis sessions over any seekable reader.
pub trait BitstreamDecoder {
    type Session<R: Read + Seek>: DecoderSession;

    /// Checks that `reader` holds a well-formed stream, then releases it.
    fn test<R: Read + Seek>(&self, reader: R) -> Result<(), DecodeError> {
        self.open(reader).map(drop)
    }

    fn open<R: Read + Seek>(&self, reader: R) -> Result<Self::Session<R>, DecodeError>;
}

/// [`BitstreamDecoder`] backed by `lewton`.
#[derive(Debug, Clone, Copy)]
pub struct LewtonDecoder {
    scan_chunk_size: usize,
}

impl Default for LewtonDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CHUNK_SIZE)
    }
}

impl LewtonDecoder {
    pub fn new(scan_chunk_size: usize) -> Self {
        Self {
            scan_chunk_size: scan_chunk_size.max(PAGE_HEADER_SIZE),
        }
    }
}

impl BitstreamDecoder for LewtonDecoder {
    type Session<R: Read + Seek> = LewtonSession<R>;

    /// Header-only open: parses the identification, comment and setup packets.
    fn test<R: Read + Seek>(&self, reader: R) -> Result<(), DecodeError> {
        let reader = OggStreamReader::new(reader)?;
        trace!(
            channels = reader.ident_hdr.audio_channels,
            rate = reader.ident_hdr.audio_sample_rate,
            "Vorbis headers valid"
        );
        Ok(())
    }

    fn open<R: Read + Seek>(&self, mut reader: R) -> Result<LewtonSession<R>, DecodeError> {
        let total_samples = last_granule_position(&mut reader, self.scan_chunk_size)?;
        reader.seek(SeekFrom::Start(0))?;
        let reader = OggStreamReader::new(reader)?;
        debug!(
            channels = reader.ident_hdr.audio_channels,
            rate = reader.ident_hdr.audio_sample_rate,
            total_samples = ?total_samples,
            "Vorbis session open"
        );
        Ok(LewtonSession {
            reader,
            total_samples,
        })
    }
}

/// A `lewton` stream reader plus the stream length found at open time.
pub struct LewtonSession<R: Read + Seek> {
    reader: OggStreamReader<R>,
    total_samples: Option<u64>,
}

impl<R: Read + Seek> LewtonSession<R> {
    /// The underlying reader, positioned after the headers, for playback.
    pub fn reader_mut(&mut self) -> &mut OggStreamReader<R> {
        &mut self.reader
    }

    pub fn into_reader(self) -> OggStreamReader<R> {
        self.reader
    }
}

impl<R: Read + Seek> DecoderSession for LewtonSession<R> {
    fn info(&self, bitstream: usize) -> Option<BitstreamInfo> {
        (bitstream == DEFAULT_BITSTREAM).then(|| BitstreamInfo {
            channels: self.reader.ident_hdr.audio_channels,
            sample_rate: self.reader.ident_hdr.audio_sample_rate,
        })
    }

    fn comments(&self, bitstream: usize) -> Vec<String> {
        if bitstream != DEFAULT_BITSTREAM {
            return Vec::new();
        }
        self.reader
            .comment_hdr
            .comment_list
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }

    fn pcm_total(&mut self) -> Result<u64, DecodeError> {
        self.total_samples
            .ok_or_else(|| DecodeError::Vorbis("no Ogg page carries a granule position".into()))
    }
}

/// Finds the granule position of the last page belonging to the first
/// logical stream, i.e. its length in PCM frames.
///
/// Scans backwards from the end in `chunk`-byte windows. Each window is
/// extended by one page header so a header straddling the boundary is seen.
pub(crate) fn last_granule_position<R: Read + Seek>(
    reader: &mut R,
    chunk: usize,
) -> io::Result<Option<u64>> {
    let end = reader.seek(SeekFrom::End(0))?;
    if end < PAGE_HEADER_SIZE as u64 {
        return Ok(None);
    }

    reader.seek(SeekFrom::Start(0))?;
    let mut first = [0u8; PAGE_HEADER_SIZE];
    reader.read_exact(&mut first)?;
    let Some((serial, _)) = parse_page_header(&first) else {
        return Ok(None);
    };

    let mut window_end = end;
    let mut buf = Vec::new();
    while window_end > 0 {
        let window_start = window_end.saturating_sub(chunk as u64);
        let read_end = (window_end + PAGE_HEADER_SIZE as u64 - 1).min(end);
        buf.resize((read_end - window_start) as usize, 0);
        reader.seek(SeekFrom::Start(window_start))?;
        reader.read_exact(&mut buf)?;

        let candidates = (window_end - window_start) as usize;
        for pos in (0..candidates).rev() {
            let Some(header) = buf.get(pos..pos + PAGE_HEADER_SIZE) else {
                continue;
            };
            match parse_page_header(header) {
                Some((page_serial, granule)) if page_serial == serial && granule != u64::MAX => {
                    return Ok(Some(granule));
                }
                _ => {}
            }
        }
        window_end = window_start;
    }
    Ok(None)
}

/// Returns `(serial, granule)` when `header` starts with a version 0 page header.
fn parse_page_header(header: &[u8]) -> Option<(u32, u64)> {
    if header.len() < PAGE_HEADER_SIZE || &header[..4] != OGG_MAGIC || header[4] != 0 {
        return None;
    }
    let granule = u64::from_le_bytes(header[6..14].try_into().ok()?);
    let serial = u32::from_le_bytes(header[14..18].try_into().ok()?);
    Some((serial, granule))
}
