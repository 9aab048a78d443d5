use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{ItemValue, Tag, TagExt, TagType};
use log::debug;

use crate::AudioFormats;
use crate::command::{Command, CommandGetter};
use crate::error::{Error, InspectionError, WritingError};

/// Tags read from a file, kept in memory until they are stripped.
#[derive(Clone)]
pub struct TagContainer {
    path: PathBuf,
    tags: Vec<Tag>,
}

impl fmt::Debug for TagContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<(TagType, usize)> = self
            .tags
            .iter()
            .map(|tag| (tag.tag_type(), tag.items().count()))
            .collect();
        f.debug_struct("TagContainer")
            .field("path", &self.path)
            .field("tags", &tags)
            .finish()
    }
}

impl TagContainer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InspectionError> {
        let path = path.as_ref();
        let tagged_file = Probe::open(path)?.read()?;
        Ok(TagContainer {
            path: path.to_path_buf(),
            tags: tagged_file.tags().to_vec(),
        })
    }

    /// `(key, value)` pairs of every tag, binary values shown by their size.
    pub fn items(&self) -> Vec<(String, String)> {
        self.tags
            .iter()
            .flat_map(|tag| {
                let pictures = match tag.picture_count() {
                    0 => None,
                    count => Some(("Pictures".to_string(), count.to_string())),
                };
                tag.items()
                    .map(|item| {
                        (format!("{:?}", item.key()), display_value(item.value()))
                    })
                    .chain(pictures)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.iter().all(|tag| tag.is_empty())
    }

    /// Removes every tag type present in the container from the file.
    /// Audio data is left untouched.
    pub fn strip(&self) -> Result<(), WritingError> {
        for tag in &self.tags {
            debug!("Removing {:?} tag from {:?}", tag.tag_type(), self.path);
            tag.tag_type().remove_from_path(&self.path)?;
        }
        Ok(())
    }
}

fn display_value(value: &ItemValue) -> String {
    match value {
        ItemValue::Binary(bytes) => format!("<{} bytes>", bytes.len()),
        other => other
            .text()
            .or_else(|| other.locator())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Deletes all the metadata of an audio file.
#[derive(Debug, Clone)]
pub struct DeleteAudioMetadata {
    pub file: PathBuf,
    tags: TagContainer,
}

impl Command for DeleteAudioMetadata {
    fn description(&self) -> String {
        let items: Vec<String> = self
            .tags
            .items()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!(
            "Delete metadata : [{}] ({})",
            items.join(", "),
            self.file.file_name().unwrap_or_default().to_string_lossy()
        )
    }

    fn execute(&self) -> Result<(), Error> {
        fs::metadata(&self.file).map_err(|source| Error::Io {
            path: self.file.clone(),
            source,
        })?;
        self.tags.strip().map_err(|source| Error::Writing {
            path: self.file.clone(),
            source,
        })
    }
}

/// Asks for a [`DeleteAudioMetadata`] on every WAV file carrying tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioMetadataDeleteCommandGetter;

impl CommandGetter for AudioMetadataDeleteCommandGetter {
    type Command = DeleteAudioMetadata;

    fn get_command(&self, file: &Path) -> Result<Option<DeleteAudioMetadata>, Error> {
        if AudioFormats::from_path(file) != Some(AudioFormats::Wav) {
            return Err(Error::UnsupportedFormat {
                path: file.to_path_buf(),
                reason: "only 'wav' files are supported at the moment".to_string(),
            });
        }
        let tags = TagContainer::open(file).map_err(|source| Error::Inspection {
            path: file.to_path_buf(),
            source,
        })?;
        if tags.is_empty() {
            return Ok(None);
        }
        Ok(Some(DeleteAudioMetadata {
            file: file.to_path_buf(),
            tags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::config::WriteOptions;
    use lofty::file::AudioFile;
    use lofty::tag::Accessor;

    fn wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..441 {
            writer.write_sample((i * 10) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn tag(path: &Path, title: &str) {
        let mut tagged_file = Probe::open(path).unwrap().read().unwrap();
        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title(title.to_string());
        tag.set_artist("Someone".to_string());
        tagged_file.insert_tag(tag);
        tagged_file
            .save_to_path(path, WriteOptions::default())
            .unwrap();
    }

    #[test]
    fn untagged_wav_needs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.wav");
        wav(&path);

        let command = AudioMetadataDeleteCommandGetter.get_command(&path).unwrap();
        assert!(command.is_none());
    }

    #[test]
    fn tagged_wav_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.wav");
        wav(&path);
        tag(&path, "Kick");

        let command = AudioMetadataDeleteCommandGetter
            .get_command(&path)
            .unwrap()
            .unwrap();
        let description = command.description();
        assert!(description.starts_with("Delete metadata : ["));
        assert!(description.contains("=Kick"));
        assert!(description.ends_with("(tagged.wav)"));
        let debug = format!("{:?}", command);
        assert!(debug.contains("Id3v2"), "{debug}");

        command.execute().unwrap();
        command.execute().unwrap();

        assert!(AudioMetadataDeleteCommandGetter
            .get_command(&path)
            .unwrap()
            .is_none());
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 441);
    }

    #[test]
    fn only_wav_is_supported() {
        let result = AudioMetadataDeleteCommandGetter.get_command(Path::new("a.mp3"));
        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    }

    #[test]
    fn vanished_file_fails_on_execute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.wav");
        wav(&path);
        tag(&path, "Snare");
        let command = AudioMetadataDeleteCommandGetter
            .get_command(&path)
            .unwrap()
            .unwrap();

        fs::remove_file(&path).unwrap();
        let err = command.execute().unwrap_err();
        assert!(err.to_string().contains("tagged.wav"));
    }
}
