use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use strum_macros::Display;

use crate::AudioFormats;
use crate::command::{Command, CommandGetter};
use crate::decode::{self, AudioBuffer};
use crate::error::Error;
use crate::resample::resample;
use crate::save::encode;

/// How samples are represented in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtype {
    PcmU8,
    Pcm16,
    Pcm24,
    Pcm32,
    Float32,
    Float64,
    ALaw,
    MuLaw,
    /// Any other codec, named by its short name (e.g. `adpcm_ima_wav`).
    Compressed(&'static str),
}

impl Subtype {
    /// Width in bytes of an integer PCM subtype.
    pub fn pcm_width_bytes(self) -> Option<u16> {
        match self {
            Subtype::PcmU8 => Some(1),
            Subtype::Pcm16 => Some(2),
            Subtype::Pcm24 => Some(3),
            Subtype::Pcm32 => Some(4),
            _ => None,
        }
    }

    /// Integer PCM subtype for a width in bytes, clamped to 1..=4.
    pub fn pcm_with_width(bytes: u16) -> Subtype {
        match bytes {
            0 | 1 => Subtype::PcmU8,
            2 => Subtype::Pcm16,
            3 => Subtype::Pcm24,
            _ => Subtype::Pcm32,
        }
    }

    /// Whether the WAV writer can produce this subtype.
    pub fn is_encodable(self) -> bool {
        self.pcm_width_bytes().is_some() || self == Subtype::Float32
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subtype::PcmU8 => f.write_str("8-bit"),
            Subtype::Pcm16 => f.write_str("16-bit"),
            Subtype::Pcm24 => f.write_str("24-bit"),
            Subtype::Pcm32 => f.write_str("32-bit"),
            Subtype::Float32 => f.write_str("32-bit float"),
            Subtype::Float64 => f.write_str("64-bit float"),
            Subtype::ALaw => f.write_str("a-law"),
            Subtype::MuLaw => f.write_str("mu-law"),
            Subtype::Compressed(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Multichannel,
}

/// Header-level description of an audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProperties {
    pub sample_rate: u32,
    pub subtype: Subtype,
    pub channels: u16,
}

impl AudioProperties {
    pub fn channel_layout(&self) -> ChannelLayout {
        match self.channels {
            0 | 1 => ChannelLayout::Mono,
            2 => ChannelLayout::Stereo,
            _ => ChannelLayout::Multichannel,
        }
    }
}

/// Which sample representations the target device accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleLimit {
    /// Integer PCM no wider than this many bytes.
    MaxWidthBytes(u16),
    /// An explicit list of subtypes. Integer PCM outside the list is narrowed
    /// to the widest allowed PCM subtype; anything else becomes `fallback`.
    AllowList {
        supported: Vec<Subtype>,
        fallback: Subtype,
    },
}

impl SampleLimit {
    /// The subtype `current` must be converted to, which is `current` itself
    /// when it is already accepted.
    pub fn target_subtype(&self, current: Subtype) -> Subtype {
        match self {
            SampleLimit::MaxWidthBytes(max) => match current.pcm_width_bytes() {
                Some(width) => Subtype::pcm_with_width(width.min(*max)),
                None => Subtype::pcm_with_width(*max),
            },
            SampleLimit::AllowList {
                supported,
                fallback,
            } => {
                if supported.contains(&current) {
                    return current;
                }
                let Some(width) = current.pcm_width_bytes() else {
                    return *fallback;
                };
                supported
                    .iter()
                    .filter_map(|s| s.pcm_width_bytes().map(|w| (w, *s)))
                    .filter(|(w, _)| *w <= width)
                    .max_by_key(|(w, _)| *w)
                    .map(|(_, s)| s)
                    .unwrap_or(*fallback)
            }
        }
    }
}

/// Maximum audio parameters supported by the destination device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTargetOutput {
    /// Container the files are written back in
    pub format: AudioFormats,
    /// Max sample rate in Hz
    pub max_sample_rate_hertz: u32,
    /// Accepted sample representations
    pub sample_limit: SampleLimit,
}

impl AudioTargetOutput {
    /// Alesis Strike Multipad: 16-bit, mono or stereo WAV at 44.1 kHz.
    pub fn alesis_strike_multipad() -> Self {
        AudioTargetOutput {
            format: AudioFormats::Wav,
            max_sample_rate_hertz: 44100,
            sample_limit: SampleLimit::MaxWidthBytes(2),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.format.is_encodable() {
            return Err(Error::InvalidOptions(format!(
                "Cannot write {} files, only wav is supported",
                self.format
            )));
        }
        if self.max_sample_rate_hertz == 0 {
            return Err(Error::InvalidOptions(
                "Max sample rate must be greater than 0".to_string(),
            ));
        }
        match &self.sample_limit {
            SampleLimit::MaxWidthBytes(width) if !(1..=4).contains(width) => {
                Err(Error::InvalidOptions(format!(
                    "Max sample width must be between 1 and 4 bytes: {}",
                    width
                )))
            }
            SampleLimit::AllowList {
                supported,
                fallback,
            } => match supported
                .iter()
                .chain(std::iter::once(fallback))
                .find(|s| !s.is_encodable())
            {
                Some(subtype) => Err(Error::InvalidOptions(format!(
                    "Cannot write {} samples",
                    subtype
                ))),
                None => Ok(()),
            },
            SampleLimit::MaxWidthBytes(_) => Ok(()),
        }
    }
}

impl Default for AudioTargetOutput {
    fn default() -> Self {
        Self::alesis_strike_multipad()
    }
}

/// Current properties of a file together with the values it must be capped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioScaling {
    pub current: AudioProperties,
    pub target_sample_rate_hertz: u32,
    pub target_subtype: Subtype,
}

impl AudioScaling {
    /// Never raises the sample rate or the sample width.
    pub fn new(current: AudioProperties, target_output: &AudioTargetOutput) -> Self {
        AudioScaling {
            current,
            target_sample_rate_hertz: current
                .sample_rate
                .min(target_output.max_sample_rate_hertz),
            target_subtype: target_output.sample_limit.target_subtype(current.subtype),
        }
    }

    pub fn needs_rescaling(&self) -> bool {
        self.target_sample_rate_hertz != self.current.sample_rate
            || self.target_subtype != self.current.subtype
    }
}

impl fmt::Display for AudioScaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}Hz -> {}|{}Hz",
            self.current.subtype,
            self.current.sample_rate,
            self.target_subtype,
            self.target_sample_rate_hertz
        )
    }
}

/// Rewrites a file with capped parameters from samples decoded during discovery.
#[derive(Debug)]
pub struct ConvertAudioFile {
    pub file: PathBuf,
    pub scaling: AudioScaling,
    pub format: AudioFormats,
    buffer: AudioBuffer,
}

impl Command for ConvertAudioFile {
    fn description(&self) -> String {
        format!(
            "Convert audio : {} ({})",
            self.scaling,
            self.file.file_name().unwrap_or_default().to_string_lossy()
        )
    }

    fn execute(&self) -> Result<(), Error> {
        fs::metadata(&self.file).map_err(|source| Error::Io {
            path: self.file.clone(),
            source,
        })?;
        let writing_error = |source| Error::Writing {
            path: self.file.clone(),
            source,
        };

        let resampled;
        let buffer = if self.buffer.sample_rate != self.scaling.target_sample_rate_hertz {
            resampled =
                resample(&self.buffer, self.scaling.target_sample_rate_hertz).map_err(writing_error)?;
            &resampled
        } else {
            &self.buffer
        };
        debug!(
            "Writing {} frames to {:?} as {}",
            buffer.frames(),
            self.file,
            self.scaling.target_subtype
        );
        encode(buffer, &self.file, self.scaling.target_subtype, self.format).map_err(writing_error)
    }
}

/// Caps sample rate and sample width to an [`AudioTargetOutput`].
#[derive(Debug, Clone)]
pub struct AudioConversionCommandGetter {
    target_output: AudioTargetOutput,
}

impl AudioConversionCommandGetter {
    pub fn new(target_output: AudioTargetOutput) -> Result<Self, Error> {
        target_output.validate()?;
        Ok(AudioConversionCommandGetter { target_output })
    }

    pub fn target_output(&self) -> &AudioTargetOutput {
        &self.target_output
    }
}

impl CommandGetter for AudioConversionCommandGetter {
    type Command = ConvertAudioFile;

    fn get_command(&self, file: &Path) -> Result<Option<ConvertAudioFile>, Error> {
        if AudioFormats::from_path(file) != Some(self.target_output.format) {
            return Err(Error::UnsupportedFormat {
                path: file.to_path_buf(),
                reason: format!("only '{}' files can be converted", self.target_output.format),
            });
        }
        let inspection_error = |source| Error::Inspection {
            path: file.to_path_buf(),
            source,
        };

        let current = decode::inspect(file).map_err(inspection_error)?;
        let scaling = AudioScaling::new(current, &self.target_output);
        debug!(
            "{:?}: {} {} channel(s), {}",
            file,
            current.channel_layout(),
            current.channels,
            scaling
        );
        if !scaling.needs_rescaling() {
            return Ok(None);
        }

        let buffer = decode::decode(file).map_err(inspection_error)?;
        Ok(Some(ConvertAudioFile {
            file: file.to_path_buf(),
            scaling,
            format: self.target_output.format,
            buffer,
        }))
    }
}
