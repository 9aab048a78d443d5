/// Target device parameters and the audio conversion policy
pub mod audio;
/// Batch orchestration: discover, preview, confirm, execute
pub mod batch;
/// Command and command getter traits
pub mod command;
/// Operator console abstraction
pub mod console;
/// Reading audio headers and samples
pub mod decode;
/// Module for error handling
pub mod error;
/// Metadata stripping policy
pub mod metadata;
/// File naming policies
pub mod naming;
/// Sample rate reduction
pub mod resample;
/// Module for saving audio files
pub mod save;

pub use crate::audio::{AudioConversionCommandGetter, AudioTargetOutput, SampleLimit, Subtype};
pub use crate::batch::{BatchOutcome, BatchReport, update_files};
pub use crate::command::{Command, CommandGetter};
pub use crate::console::{Console, Terminal};
pub use crate::error::Error;
pub use crate::metadata::AudioMetadataDeleteCommandGetter;
pub use crate::naming::{
    FileNameFormatter, RegexReplaceFormatter, RenameFileCommandGetter, TitleCaseSanitizer,
};

use log::info;
use std::path::Path;
use strum_macros::Display;

/// Represents supported audio file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "camelCase")]
pub enum AudioFormats {
    Wav,
    Mp3,
    Flac,
    Ogg,
    M4a,
    Aac,
    Opus,
}

impl AudioFormats {
    /// Returns a list of supported file extensions
    #[inline]
    pub fn supported_extensions() -> &'static [&'static str] {
        &["wav", "mp3", "flac", "ogg", "m4a", "aac", "opus"]
    }

    /// Creates an AudioFormats enum from a file path based on its extension
    #[inline]
    pub fn from_path(value: impl AsRef<Path>) -> Option<Self> {
        Self::from_extension(
            value
                .as_ref()
                .extension()
                .unwrap_or_default()
                .to_string_lossy()
                .as_ref(),
        )
    }

    /// Parses an extension, ignoring case, surrounding whitespace and a leading dot
    pub fn from_extension(extension: &str) -> Option<Self> {
        Some(
            match extension
                .trim()
                .trim_start_matches('.')
                .to_lowercase()
                .as_ref()
            {
                "wav" => Self::Wav,
                "mp3" => Self::Mp3,
                "flac" => Self::Flac,
                "ogg" => Self::Ogg,
                "m4a" => Self::M4a,
                "aac" => Self::Aac,
                "opus" => Self::Opus,
                _ => return None,
            },
        )
    }

    /// Whether files of this format can be written back
    #[inline]
    pub fn is_encodable(self) -> bool {
        self == Self::Wav
    }
}

/// Returns true if `file` is a regular file with the extension of `format`
pub fn has_format(file: impl AsRef<Path>, format: AudioFormats) -> bool {
    let file = file.as_ref();
    file.is_file() && AudioFormats::from_path(file) == Some(format)
}

/// Renames every `file_format` file under `root_dir` with `formatter`
pub fn normalize_audio_filenames<C: Console + ?Sized>(
    root_dir: impl AsRef<Path>,
    formatter: &RenameFileCommandGetter,
    file_format: AudioFormats,
    console: &mut C,
) -> Result<BatchReport, Error> {
    info!("File name normalization");
    update_files(
        root_dir,
        |file| has_format(file, file_format),
        formatter,
        console,
    )
}

/// Caps sample rate and width of the files under `root_dir` to `target_output`
pub fn convert_audio_files<C: Console + ?Sized>(
    root_dir: impl AsRef<Path>,
    target_output: &AudioTargetOutput,
    console: &mut C,
) -> Result<BatchReport, Error> {
    info!("Audio file conversion");
    let cmd_getter = AudioConversionCommandGetter::new(target_output.clone())?;
    let format = target_output.format;
    update_files(
        root_dir,
        |file| has_format(file, format),
        &cmd_getter,
        console,
    )
}

/// Removes all the metadata from the `file_format` files under `root_dir`
pub fn remove_audio_files_metadata<C: Console + ?Sized>(
    root_dir: impl AsRef<Path>,
    file_format: AudioFormats,
    console: &mut C,
) -> Result<BatchReport, Error> {
    info!("Audio file metadata suppression");
    update_files(
        root_dir,
        |file| has_format(file, file_format),
        &AudioMetadataDeleteCommandGetter,
        console,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_from_path() {
        assert_eq!(AudioFormats::from_path("a/b.WAV"), Some(AudioFormats::Wav));
        assert_eq!(AudioFormats::from_path("b.flac"), Some(AudioFormats::Flac));
        assert_eq!(AudioFormats::from_path("b.txt"), None);
        assert_eq!(AudioFormats::from_path("wav"), None);
        assert_eq!(AudioFormats::from_extension(" .Wav "), Some(AudioFormats::Wav));
        assert_eq!(AudioFormats::Wav.to_string(), "wav");
    }

    #[test]
    fn has_format_requires_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("folder.wav");
        std::fs::create_dir(&folder).unwrap();
        let file = dir.path().join("x.wav");
        std::fs::write(&file, b"").unwrap();

        assert!(!has_format(&folder, AudioFormats::Wav));
        assert!(has_format(&file, AudioFormats::Wav));
        assert!(!has_format(&file, AudioFormats::Mp3));
    }
}
