use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;

use crate::AudioFormats;
use crate::audio::Subtype;

/// Failures while reading a file's header, samples or tags.
#[derive(thiserror::Error, Debug)]
pub enum InspectionError {
    #[error("Reading wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Symphonia error: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("Reading tags error: {0}")]
    Tag(#[from] lofty::error::LoftyError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No compatible audio track found")]
    NoTrack,
    #[error("Sample rate is missing from the header")]
    MissingSampleRate,
    #[error("Channel layout is missing from the header")]
    MissingChannels,
    #[error("Unsupported sample format")]
    UnsupportedSampleFormat,
}

/// Failures while writing a file back to disk.
#[derive(thiserror::Error, Debug)]
pub enum WritingError {
    #[error("Writing wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Resampling error: {0}")]
    Resample(String),
    #[error("Writing tags error: {0}")]
    Tag(#[from] lofty::error::LoftyError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot encode samples as {0}")]
    UnsupportedSubtype(Subtype),
    #[error("Cannot encode a {0} container")]
    UnsupportedContainer(AudioFormats),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The file cannot be handled by the command getter at all. This is a
    /// predicate/getter mismatch and aborts the whole run.
    #[error("Unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("Inspection failed for {path}: {source}")]
    Inspection {
        path: PathBuf,
        #[source]
        source: InspectionError,
    },
    #[error("Writing failed for {path}: {source}")]
    Writing {
        path: PathBuf,
        #[source]
        source: WritingError,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// Whether the error must stop the batch run instead of only skipping a file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. } | Error::InvalidOptions(_)
        )
    }
}
