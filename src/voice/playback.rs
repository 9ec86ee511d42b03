//! Audio playback to speakers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Preferred output rate (most droid clips are CD quality)
const PREFERRED_SAMPLE_RATE: u32 = 44100;

/// Extra time allowed past the clip length before playback counts as stalled
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Plays audio to an output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a playback instance on the named output device, or the default one
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::Audio(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| Error::Audio(format!("output device not found: {name}")))?,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Audio("no output device available".to_string()))?,
        };

        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(PREFERRED_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PREFERRED_SAMPLE_RATE)
        };

        let preferred = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                // Fallback: try stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .map(|c| c.with_sample_rate(SampleRate(PREFERRED_SAMPLE_RATE)));

        // Last resort: whatever the device runs at, clips get resampled
        let config = match preferred {
            Some(c) => c.config(),
            None => device
                .default_output_config()
                .map_err(|e| Error::Audio(format!("no suitable output config found: {e}")))?
                .config(),
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Output sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Play mono samples recorded at `sample_rate`, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails, the stream cannot be opened, or
    /// the device stops consuming samples
    pub fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let output_rate = self.sample_rate();
        let samples: Arc<[f32]> = if sample_rate == output_rate {
            Arc::from(samples)
        } else {
            resample(samples, sample_rate, output_rate)?.into()
        };
        let sample_count = samples.len();
        let channels = usize::from(self.config.channels).max(1);

        let finished = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));
        let finished_cb = Arc::clone(&finished);
        let failed_cb = Arc::clone(&failed);
        let source = Arc::clone(&samples);
        let mut position = 0usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = source.get(position).copied().unwrap_or(0.0);
                        frame.fill(sample);

                        if position < source.len() {
                            position += 1;
                        } else {
                            finished_cb.store(true, Ordering::Release);
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    failed_cb.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion with timeout
        let duration_ms = (sample_count as u64 * 1000) / u64::from(output_rate.max(1));
        let timeout = Duration::from_millis(duration_ms) + DRAIN_GRACE;
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) {
            if failed.load(Ordering::Acquire) {
                return Err(Error::Audio("output stream failed".to_string()));
            }
            if start.elapsed() > timeout {
                return Err(Error::Audio(format!(
                    "playback stalled after {:?}",
                    start.elapsed()
                )));
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        // Small delay to ensure audio finishes
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Resample mono audio using rubato
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate.max(1) as usize + chunk_size);

    for chunk in input.chunks(chunk_size) {
        // Pad the tail so the last partial chunk is not dropped
        let mut frame = chunk.to_vec();
        frame.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[frame], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output.iter().map(|&s| s as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_changes_length_proportionally() {
        let input = vec![0.1f32; 22050];
        let output = resample(&input, 22050, 44100).unwrap();

        // Roughly doubled, allowing for the padded tail and filter delay
        assert!(output.len() >= 44100 - 2048, "got {}", output.len());
        assert!(output.len() <= 44100 + 4096, "got {}", output.len());
    }
}
