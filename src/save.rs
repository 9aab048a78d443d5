use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::AudioFormats;
use crate::audio::Subtype;
use crate::decode::AudioBuffer;
use crate::error::WritingError;

/// Writes `buffer` to `path` in the given container and subtype, replacing
/// the previous content of `path` in one rename.
///
/// # Arguments
/// * `buffer` - Interleaved samples in `[-1.0, 1.0]`
/// * `path` - File to replace
/// * `subtype` - Sample representation to quantize to
/// * `format` - Container, only WAV can be written
pub fn encode(
    buffer: &AudioBuffer,
    path: &Path,
    subtype: Subtype,
    format: AudioFormats,
) -> Result<(), WritingError> {
    if !format.is_encodable() {
        return Err(WritingError::UnsupportedContainer(format));
    }
    let partial = partial_path(path);
    let result = save_as_wav(&partial, buffer, subtype).and_then(|_| Ok(fs::rename(&partial, path)?));
    if result.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            warn!("Failed to remove {:?}: {}", partial, e);
        }
    }
    result
}

/// `song.wav` -> `song.wav.part`, next to the original so the final rename
/// stays on the same device.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Saves audio data as a WAV file
///
/// # Returns
/// Result indicating success or a WritingError
pub fn save_as_wav(
    path: &Path,
    buffer: &AudioBuffer,
    subtype: Subtype,
) -> Result<(), WritingError> {
    let (bits_per_sample, sample_format) = match subtype {
        Subtype::Float32 => (32, hound::SampleFormat::Float),
        other => match other.pcm_width_bytes() {
            Some(width) => (width * 8, hound::SampleFormat::Int),
            None => return Err(WritingError::UnsupportedSubtype(other)),
        },
    };
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample,
        sample_format,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &buffer.samples {
        match subtype {
            Subtype::Float32 => writer.write_sample(sample)?,
            Subtype::PcmU8 => writer.write_sample(quantize(sample, 8) as i8)?,
            Subtype::Pcm16 => writer.write_sample(quantize(sample, 16) as i16)?,
            _ => writer.write_sample(quantize(sample, bits_per_sample))?,
        }
    }
    Ok(writer.finalize()?)
}

/// Scales a normalized sample to a signed integer of `bits` bits, clipping.
fn quantize(sample: f32, bits: u16) -> i32 {
    let max = ((1i64 << (bits - 1)) - 1) as f64;
    (sample.clamp(-1.0, 1.0) as f64 * max).round() as i32
}
