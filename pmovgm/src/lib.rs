//! # pmovgm
//!
//! Opens Ogg Vorbis streams shipped inside game containers.
//!
//! Many games store their music as plain Ogg Vorbis hidden behind a small
//! header or a byte obfuscation scheme, and record loop points in comment
//! tags that never agreed on a name. This crate identifies the container,
//! undoes the obfuscation on the fly while a Vorbis decoder reads it, and
//! reports the stream format together with its loop region.
//!
//! ## Features
//!
//! - **Variant detection**: plain `.ogg`/`.logg`, Ultramarine3 `.um3`,
//!   KOVS `.kvs`/`.kovs`, Psychic Software `.ogg`, MT Framework `.sngw`, `.isd`
//! - **Transparent deobfuscation**: bytes are fixed up as they are read, keyed
//!   on their offset inside the Ogg stream
//! - **Loop tags**: every known comment convention, resolved against the
//!   stream length
//! - **Pluggable decoder**: `lewton` by default, any [`BitstreamDecoder`] works
//!
//! ## Example
//!
//! ```no_run
//! use pmovgm::{LoaderConfig, open_path};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoaderConfig::load(None)?;
//!     let stream = open_path("bgm_01.kvs", &config)?;
//!
//!     println!("{} Hz, {} channels", stream.sample_rate, stream.channels);
//!     if let Some(region) = stream.loop_region {
//!         println!("loops {}..{}", region.start, region.end);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod detect;
pub mod error;
pub mod io;
pub mod loops;
pub mod source;
pub mod stream;
pub mod transform;
mod util;

/// Ogg page capture pattern.
pub const OGG_MAGIC: &[u8; 4] = b"OggS";
/// KOVS container id.
pub const KOVS_MAGIC: &[u8; 4] = b"KOVS";
/// First word of a Psychic Software `.ogg`, read big-endian.
pub const PSYCHIC_MAGIC: u32 = 0x2C44_4430;

pub use config::LoaderConfig;
pub use decoder::{BitstreamDecoder, BitstreamInfo, DecoderSession, LewtonDecoder, LewtonSession};
pub use detect::{OggVariant, VorbisInfo, detect};
pub use error::{DecodeError, LoaderError};
pub use io::{CallbackStream, IoCallbacks, SharedCallbacks, VirtualFile, VirtualIoBridge, Whence};
pub use loops::{LoopInfo, LoopRegion, extract_loop_info};
pub use source::{ByteSource, FileSource, MemorySource};
pub use stream::{
    CodingType, LayoutType, StreamDescriptor, VorbisStream, open_ogg_vorbis, open_ogg_vorbis_with,
    open_path, open_path_async,
};
pub use transform::ByteTransform;
