//! Read side of the codec boundary.
//!
//! WAV files are read with `hound`. Encodings `hound` refuses (a-law, mu-law,
//! ADPCM, 64-bit float...) fall back to `symphonia`.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{self, CODEC_TYPE_NULL, CodecType, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::{AudioProperties, Subtype};
use crate::error::InspectionError;

/// Decoded audio, interleaved, normalized to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// Reads the header-level properties of `path` without decoding samples.
pub fn inspect(path: impl AsRef<Path>) -> Result<AudioProperties, InspectionError> {
    let path = path.as_ref();
    match hound::WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            Ok(AudioProperties {
                sample_rate: spec.sample_rate,
                subtype: subtype_from_wav_spec(&spec)?,
                channels: spec.channels,
            })
        }
        Err(hound::Error::Unsupported) => {
            debug!("hound cannot read {:?}, probing with symphonia", path);
            let format = open_format(path)?;
            let track = default_track(format.as_ref())?;
            properties_from_track(track)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fully decodes `path` into memory.
pub fn decode(path: impl AsRef<Path>) -> Result<AudioBuffer, InspectionError> {
    let path = path.as_ref();
    match hound::WavReader::open(path) {
        Ok(reader) => decode_wav(reader),
        Err(hound::Error::Unsupported) => decode_with_symphonia(path),
        Err(e) => Err(e.into()),
    }
}

fn subtype_from_wav_spec(spec: &hound::WavSpec) -> Result<Subtype, InspectionError> {
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 1..=8) => Ok(Subtype::PcmU8),
        (hound::SampleFormat::Int, 9..=16) => Ok(Subtype::Pcm16),
        (hound::SampleFormat::Int, 17..=24) => Ok(Subtype::Pcm24),
        (hound::SampleFormat::Int, 25..=32) => Ok(Subtype::Pcm32),
        (hound::SampleFormat::Float, 32) => Ok(Subtype::Float32),
        _ => Err(InspectionError::UnsupportedSampleFormat),
    }
}

fn decode_wav<R: std::io::Read>(
    mut reader: hound::WavReader<R>,
) -> Result<AudioBuffer, InspectionError> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << spec.bits_per_sample.saturating_sub(1)).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|value| value as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(AudioBuffer {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn open_format(path: &Path) -> Result<Box<dyn FormatReader>, InspectionError> {
    let file = fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }
    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    Ok(probed.format)
}

fn default_track(format: &dyn FormatReader) -> Result<&Track, InspectionError> {
    format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(InspectionError::NoTrack)
}

fn properties_from_track(track: &Track) -> Result<AudioProperties, InspectionError> {
    let params = &track.codec_params;
    Ok(AudioProperties {
        sample_rate: params
            .sample_rate
            .ok_or(InspectionError::MissingSampleRate)?,
        subtype: subtype_from_codec(params.codec),
        channels: params
            .channels
            .ok_or(InspectionError::MissingChannels)?
            .count() as u16,
    })
}

fn subtype_from_codec(codec: CodecType) -> Subtype {
    match codec {
        codecs::CODEC_TYPE_PCM_U8 | codecs::CODEC_TYPE_PCM_S8 => Subtype::PcmU8,
        codecs::CODEC_TYPE_PCM_S16LE | codecs::CODEC_TYPE_PCM_S16BE => Subtype::Pcm16,
        codecs::CODEC_TYPE_PCM_S24LE | codecs::CODEC_TYPE_PCM_S24BE => Subtype::Pcm24,
        codecs::CODEC_TYPE_PCM_S32LE | codecs::CODEC_TYPE_PCM_S32BE => Subtype::Pcm32,
        codecs::CODEC_TYPE_PCM_F32LE | codecs::CODEC_TYPE_PCM_F32BE => Subtype::Float32,
        codecs::CODEC_TYPE_PCM_F64LE | codecs::CODEC_TYPE_PCM_F64BE => Subtype::Float64,
        codecs::CODEC_TYPE_PCM_ALAW => Subtype::ALaw,
        codecs::CODEC_TYPE_PCM_MULAW => Subtype::MuLaw,
        other => Subtype::Compressed(
            symphonia::default::get_codecs()
                .get_codec(other)
                .map(|descriptor| descriptor.short_name)
                .unwrap_or("unknown"),
        ),
    }
}

fn decode_with_symphonia(path: &Path) -> Result<AudioBuffer, InspectionError> {
    let mut format = open_format(path)?;
    let track = default_track(format.as_ref())?;
    let track_id = track.id;
    let AudioProperties {
        sample_rate,
        channels,
        ..
    } = properties_from_track(track)?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;

    let mut planes: Vec<Vec<f32>> = vec![Vec::new(); channels as usize];
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                for (plane, samples) in planes.iter_mut().zip(planar_f32(&decoded)?) {
                    plane.extend(samples);
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(
                    "Decode error in {:?}: {}. Skipping packet.",
                    path.file_name().unwrap_or_default(),
                    e
                );
            }
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(AudioBuffer {
        samples: interleave(&planes),
        channels,
        sample_rate,
    })
}

/// Converts any symphonia buffer to one normalized `f32` vector per channel.
fn planar_f32(decoded: &AudioBufferRef<'_>) -> Result<Vec<Vec<f32>>, InspectionError> {
    let planes = match decoded {
        AudioBufferRef::F32(buf) => buf.planes().planes().iter().map(|p| p.to_vec()).collect(),
        AudioBufferRef::F64(buf) => buf
            .planes()
            .planes()
            .iter()
            .map(|p| p.iter().map(|&s| s as f32).collect())
            .collect(),
        AudioBufferRef::S32(buf) => buf
            .planes()
            .planes()
            .iter()
            .map(|p| p.iter().map(|&s| s as f32 / i32::MAX as f32).collect())
            .collect(),
        AudioBufferRef::S24(buf) => buf
            .planes()
            .planes()
            .iter()
            // i24 spans -2^23..2^23-1
            .map(|p| p.iter().map(|&s| s.inner() as f32 / 8_388_607.0).collect())
            .collect(),
        AudioBufferRef::S16(buf) => buf
            .planes()
            .planes()
            .iter()
            .map(|p| p.iter().map(|&s| s as f32 / i16::MAX as f32).collect())
            .collect(),
        AudioBufferRef::S8(buf) => buf
            .planes()
            .planes()
            .iter()
            .map(|p| p.iter().map(|&s| s as f32 / i8::MAX as f32).collect())
            .collect(),
        AudioBufferRef::U8(buf) => buf
            .planes()
            .planes()
            .iter()
            .map(|p| p.iter().map(|&s| (s as i16 - 128) as f32 / 128.0).collect())
            .collect(),
        _ => return Err(InspectionError::UnsupportedSampleFormat),
    };
    Ok(planes)
}

pub(crate) fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
    let mut interleaved = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        for plane in planes {
            interleaved.push(plane[frame]);
        }
    }
    interleaved
}

pub(crate) fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels.max(1) as usize;
    let mut planes = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, frames: usize) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames * spec.channels as usize {
            match spec.sample_format {
                hound::SampleFormat::Float => writer.write_sample((i % 7) as f32 / 10.0).unwrap(),
                hound::SampleFormat::Int => writer.write_sample((i % 7) as i32 * 100).unwrap(),
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn inspect_reads_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&path, spec, 10);

        let properties = inspect(&path).unwrap();
        assert_eq!(
            properties,
            AudioProperties {
                sample_rate: 48000,
                subtype: Subtype::Pcm24,
                channels: 2,
            }
        );
    }

    #[test]
    fn decode_normalizes_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for sample in [0i16, 16384, -32768] {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = decode(&path).unwrap();
        assert_eq!(buffer.samples, vec![0.0, 0.5, -1.0]);
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.sample_rate, 8000);
        assert_eq!(buffer.frames(), 3);
    }

    #[test]
    fn decode_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        write_wav(&path, spec, 4);

        assert_eq!(inspect(&path).unwrap().subtype, Subtype::Float32);
        assert_eq!(decode(&path).unwrap().samples.len(), 8);
    }

    #[test]
    fn inspect_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        fs::write(&path, b"definitely not audio").unwrap();
        assert!(inspect(&path).is_err());
    }

    #[test]
    fn interleave_roundtrip() {
        let planes = vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]];
        let interleaved = interleave(&planes);
        assert_eq!(interleaved, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(deinterleave(&interleaved, 2), planes);
    }
}
