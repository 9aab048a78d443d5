//! Sample rate reduction with rubato.

use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::decode::{AudioBuffer, deinterleave, interleave};
use crate::error::WritingError;

const CHUNK_FRAMES: usize = 1024;

/// Resamples `buffer` to `target_rate`, keeping its duration.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, WritingError> {
    if buffer.sample_rate == target_rate || buffer.frames() == 0 {
        return Ok(AudioBuffer {
            sample_rate: target_rate,
            ..buffer.clone()
        });
    }
    if target_rate == 0 || buffer.sample_rate == 0 || buffer.channels == 0 {
        return Err(WritingError::Resample(format!(
            "Cannot resample {} channel(s) from {}Hz to {}Hz",
            buffer.channels, buffer.sample_rate, target_rate
        )));
    }

    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let channels = buffer.channels as usize;
    // band-limited: the cutoff follows the lower of the two rates
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)
        .map_err(|e| WritingError::Resample(e.to_string()))?;

    let planes = deinterleave(&buffer.samples, buffer.channels);
    let frames = buffer.frames();
    let expected = (frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut position = 0;
    while position + CHUNK_FRAMES <= frames {
        let chunk: Vec<&[f32]> = planes
            .iter()
            .map(|p| &p[position..position + CHUNK_FRAMES])
            .collect();
        let processed = resampler
            .process(chunk.as_slice(), None)
            .map_err(|e| WritingError::Resample(e.to_string()))?;
        append(&mut output, processed);
        position += CHUNK_FRAMES;
    }
    if position < frames {
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[position..]).collect();
        let processed = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| WritingError::Resample(e.to_string()))?;
        append(&mut output, processed);
    }
    // flush the filter delay
    while output[0].len() < expected + delay {
        let processed = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| WritingError::Resample(e.to_string()))?;
        append(&mut output, processed);
    }
    for plane in &mut output {
        plane.drain(..delay);
        plane.truncate(expected);
    }

    debug!(
        "Resampled {} frames at {}Hz to {} frames at {}Hz",
        frames, buffer.sample_rate, expected, target_rate
    );
    Ok(AudioBuffer {
        samples: interleave(&output),
        channels: buffer.channels,
        sample_rate: target_rate,
    })
}

fn append(output: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (plane, samples) in output.iter_mut().zip(processed) {
        plane.extend(samples);
    }
}
