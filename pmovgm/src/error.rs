use std::io;

/// Errors reported by the external Vorbis decoder while opening a stream.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Ogg/Vorbis decode error: {0}")]
    Vorbis(String),
}

impl From<lewton::VorbisError> for DecodeError {
    fn from(err: lewton::VorbisError) -> Self {
        DecodeError::Vorbis(err.to_string())
    }
}

impl From<String> for DecodeError {
    fn from(value: String) -> Self {
        DecodeError::Vorbis(value)
    }
}

/// Errors returned when opening a game Ogg container.
#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    /// Extension or magic mismatch; the source is simply not one of ours.
    #[error("not a recognized Ogg container")]
    NotRecognized,
    #[error("malformed Ogg Vorbis stream: {0}")]
    MalformedStream(#[from] DecodeError),
    #[error("cannot open {name}: {source}")]
    ResourceUnavailable {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{role} task failed: {details}")]
    TaskJoin { role: &'static str, details: String },
}

impl LoaderError {
    /// True for a negative detection result rather than a real failure.
    pub fn is_not_recognized(&self) -> bool {
        matches!(self, LoaderError::NotRecognized)
    }
}
