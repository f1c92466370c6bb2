//! Stream assembly: the two-phase open and the resulting descriptor.
//!
//! Opening runs twice over the same parameters. The validation pass borrows
//! the caller's probing handle and only checks that the deobfuscated bytes
//! form a Vorbis stream; it is fully released before the commit pass, which
//! reopens the resource by name and keeps that session for the life of the
//! returned [`StreamDescriptor`]. Anything acquired along a failed path is
//! dropped before the error is returned.

use std::{path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::{
    config::LoaderConfig,
    decoder::{BitstreamDecoder, DEFAULT_BITSTREAM, DecoderSession, LewtonDecoder, LewtonSession},
    detect::{OggVariant, VorbisInfo, detect},
    error::{DecodeError, LoaderError},
    io::{CallbackStream, SharedCallbacks, VirtualFile, VirtualIoBridge},
    loops::{LoopRegion, extract_loop_info},
    source::{ByteSource, FileSource},
};

/// Codec of the wrapped bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingType {
    OggVorbis,
}

/// How samples are laid out for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutType {
    OggVorbis,
}

/// A fully opened stream, ready for playback elsewhere.
///
/// Owns the decoder session; dropping the descriptor closes it together with
/// the byte source underneath.
pub struct StreamDescriptor<S> {
    pub channels: u8,
    pub sample_rate: u32,
    pub num_samples: u64,
    pub loop_region: Option<LoopRegion>,
    pub coding: CodingType,
    pub meta: OggVariant,
    pub layout: LayoutType,
    /// Size of the virtual Ogg stream in bytes.
    pub stream_size: u64,
    pub total_subsongs: u32,
    session: S,
}

impl<S> StreamDescriptor<S> {
    pub fn loop_flag(&self) -> bool {
        self.loop_region.is_some()
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

impl<S> std::fmt::Debug for StreamDescriptor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("num_samples", &self.num_samples)
            .field("loop_region", &self.loop_region)
            .field("coding", &self.coding)
            .field("meta", &self.meta)
            .field("layout", &self.layout)
            .field("stream_size", &self.stream_size)
            .field("total_subsongs", &self.total_subsongs)
            .finish_non_exhaustive()
    }
}

/// Descriptor produced by the default `lewton` decoder.
pub type VorbisStream = StreamDescriptor<LewtonSession<CallbackStream<'static>>>;

/// Detects the container variant of `source` and opens it.
pub fn open_ogg_vorbis<S, D>(
    source: &S,
    decoder: &D,
) -> Result<StreamDescriptor<D::Session<CallbackStream<'static>>>, LoaderError>
where
    S: ByteSource + 'static,
    D: BitstreamDecoder,
{
    let info = detect(source)?;
    let start = info.start_offset;
    open_ogg_vorbis_with(source, decoder, source.name(), None, start, info)
}

/// Opens `source` with an explicit detection result.
///
/// This is the entry point for containers detected elsewhere: any caller able
/// to describe where the Ogg stream sits and how it is obfuscated can open it
/// without going through [`detect`]. `filename` is used to reopen the resource
/// for the committed session; `callbacks` defaults to [`VirtualIoBridge`].
pub fn open_ogg_vorbis_with<S, D>(
    source: &S,
    decoder: &D,
    filename: &str,
    callbacks: Option<SharedCallbacks>,
    start: u64,
    info: VorbisInfo,
) -> Result<StreamDescriptor<D::Session<CallbackStream<'static>>>, LoaderError>
where
    S: ByteSource + 'static,
    D: BitstreamDecoder,
{
    let callbacks = callbacks.unwrap_or_else(|| Arc::new(VirtualIoBridge));
    let stream_size = info
        .stream_size
        .unwrap_or_else(|| source.size().saturating_sub(start));

    // validation over the caller's handle, released at the end of this block
    {
        let window = VirtualFile::new(Box::new(source), start, stream_size, info.transform);
        let stream = CallbackStream::new(window, callbacks.clone());
        if let Err(err) = decoder.test(stream) {
            warn!(source = filename, error = %err, "not a valid Vorbis stream");
            return Err(err.into());
        }
    }

    let reopened = source.open(filename).map_err(|err| {
        warn!(source = filename, error = %err, "cannot reopen source");
        LoaderError::ResourceUnavailable {
            name: filename.to_string(),
            source: err,
        }
    })?;
    let file = VirtualFile::new(Box::new(reopened), start, stream_size, info.transform);
    let mut session = decoder.open(CallbackStream::new(file, callbacks))?;

    let format = session
        .info(DEFAULT_BITSTREAM)
        .ok_or_else(|| DecodeError::from("missing bitstream 0".to_string()))?;
    if format.channels == 0 || format.sample_rate == 0 {
        return Err(DecodeError::Vorbis(format!(
            "invalid format: {} channels at {} Hz",
            format.channels, format.sample_rate
        ))
        .into());
    }

    let loop_info = extract_loop_info(session.comments(DEFAULT_BITSTREAM), info.loop_info);
    let num_samples = session.pcm_total()?;
    let loop_region = loop_info.resolve(num_samples);

    debug!(
        source = filename,
        meta = ?info.meta,
        channels = format.channels,
        sample_rate = format.sample_rate,
        num_samples,
        loop_region = ?loop_region,
        "Ogg Vorbis stream open"
    );

    Ok(StreamDescriptor {
        channels: format.channels,
        sample_rate: format.sample_rate,
        num_samples,
        loop_region,
        coding: CodingType::OggVorbis,
        meta: info.meta,
        layout: info.layout,
        stream_size,
        total_subsongs: info.total_subsongs,
        session,
    })
}

/// Opens a file on disk with the default `lewton` decoder.
pub fn open_path(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<VorbisStream, LoaderError> {
    let path = path.as_ref();
    let source =
        FileSource::with_buffer_size(path, config.source.buffer_size).map_err(|err| {
            LoaderError::ResourceUnavailable {
                name: path.display().to_string(),
                source: err,
            }
        })?;
    let decoder = LewtonDecoder::new(config.decoder.scan_chunk_size);
    open_ogg_vorbis(&source, &decoder)
}

/// [`open_path`] on Tokio's blocking pool.
pub async fn open_path_async(
    path: impl AsRef<Path>,
    config: &LoaderConfig,
) -> Result<VorbisStream, LoaderError> {
    let path = path.as_ref().to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || open_path(&path, &config))
        .await
        .map_err(|err| LoaderError::TaskJoin {
            role: "ogg-open",
            details: err.to_string(),
        })?
}
