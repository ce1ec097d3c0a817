//! Resampling, channel mixing, and PCM conversion.

/// Stateless stereo mixer targeting a fixed output sample rate.
///
/// Output layout: `Left = mic + system_L`, `Right = mic + system_R`. The
/// mono mic sits in the center of the stereo field; system audio keeps
/// its own image. No saturation is applied while mixing; samples clamp
/// when converted to integer PCM.
#[derive(Debug, Clone)]
pub struct StereoMixer {
    /// Output rate every operation resamples toward.
    pub target_sample_rate: f64,
}

/// Rates closer than this are treated as equal.
const RATE_EPSILON: f64 = 0.01;

impl StereoMixer {
    pub fn new(target_sample_rate: f64) -> Self {
        Self { target_sample_rate }
    }

    /// Resample mono audio from `source_rate` by linear interpolation.
    ///
    /// Identity when the rates match or the input is empty. Produces
    /// `⌊len · target / source⌋` samples; past the last input pair the
    /// output clamps to the final sample.
    pub fn resample_mono(&self, samples: &[f32], source_rate: f64) -> Vec<f32> {
        if (source_rate - self.target_sample_rate).abs() < RATE_EPSILON || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = self.target_sample_rate / source_rate;
        let output_len = (samples.len() as f64 * ratio) as usize;
        let mut output = Vec::with_capacity(output_len);
        for i in 0..output_len {
            let position = i as f64 / ratio;
            let index = position as usize;
            let fraction = (position - index as f64) as f32;
            let value = if index + 1 < samples.len() {
                samples[index] * (1.0 - fraction) + samples[index + 1] * fraction
            } else {
                samples[samples.len() - 1]
            };
            output.push(value);
        }
        output
    }

    /// Resample interleaved stereo, interpolating each channel per frame.
    pub fn resample_stereo(&self, samples: &[f32], source_rate: f64) -> Vec<f32> {
        if (source_rate - self.target_sample_rate).abs() < RATE_EPSILON || samples.is_empty() {
            return samples.to_vec();
        }

        let frames = samples.len() / 2;
        let ratio = self.target_sample_rate / source_rate;
        let output_frames = (frames as f64 * ratio) as usize;
        let mut output = vec![0.0f32; output_frames * 2];
        for i in 0..output_frames {
            let position = i as f64 / ratio;
            let index = position as usize;
            let fraction = (position - index as f64) as f32;
            for ch in 0..2 {
                output[i * 2 + ch] = if index + 1 < frames {
                    samples[index * 2 + ch] * (1.0 - fraction)
                        + samples[(index + 1) * 2 + ch] * fraction
                } else if index < frames {
                    samples[index * 2 + ch]
                } else {
                    0.0
                };
            }
        }
        output
    }

    /// Interleave two mono channels as `[L0, R0, L1, R1, …]`.
    ///
    /// The shorter side is zero-padded to `max(|left|, |right|)` frames.
    pub fn interleave(&self, left: &[f32], right: &[f32]) -> Vec<f32> {
        let frames = left.len().max(right.len());
        let mut stereo = vec![0.0f32; frames * 2];
        for i in 0..frames {
            if i < left.len() {
                stereo[i * 2] = left[i];
            }
            if i < right.len() {
                stereo[i * 2 + 1] = right[i];
            }
        }
        stereo
    }

    /// Fold a mono mic signal into interleaved stereo system audio.
    ///
    /// Output frame count is `max(|mic|, |system| / 2)`; whichever source
    /// runs short contributes silence for the remainder.
    pub fn mix_mono_mic_with_stereo_system(&self, mic: &[f32], system: &[f32]) -> Vec<f32> {
        let frames = mic.len().max(system.len() / 2);
        let mut stereo = vec![0.0f32; frames * 2];
        for i in 0..frames {
            let mic_sample = mic.get(i).copied().unwrap_or(0.0);
            let sys_left = system.get(i * 2).copied().unwrap_or(0.0);
            let sys_right = system.get(i * 2 + 1).copied().unwrap_or(0.0);
            stereo[i * 2] = mic_sample + sys_left;
            stereo[i * 2 + 1] = mic_sample + sys_right;
        }
        stereo
    }

    /// Convert float samples to 16-bit little-endian PCM bytes.
    ///
    /// Samples outside `[-1.0, 1.0]` clamp, so full negative scale maps to
    /// `-i16::MAX` rather than `i16::MIN`.
    pub fn to_int16_pcm(&self, samples: &[f32]) -> Vec<u8> {
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            pcm.extend_from_slice(&value.to_le_bytes());
        }
        pcm
    }
}

/// Average interleaved multi-channel audio down to mono.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Root-mean-square level of a buffer, 0.0 for silence.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_of_squares / samples.len() as f32).sqrt()
}

/// Largest absolute sample in a buffer.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}
