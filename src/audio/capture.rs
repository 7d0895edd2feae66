//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::error::{KioskError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// Upper bound on buffered samples (30s at 16kHz) so an unread stream
/// cannot grow without limit between listening windows.
const MAX_BUFFERED_SAMPLES: usize = 16000 * 30;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL's backend probing makes ALSA and JACK print harmless noise.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` on fd 2; only called while no other
/// thread writes to stderr.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Find the named input device, or the host default.
fn find_input_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| KioskError::AudioCapture {
                    message: format!("Failed to enumerate input devices: {}", e),
                })?
                .find(|device| device.name().is_ok_and(|n| n == name))
                .ok_or_else(|| KioskError::AudioDeviceNotFound {
                    device: name.to_string(),
                }),
            None => host
                .default_input_device()
                .ok_or_else(|| KioskError::AudioDeviceNotFound {
                    device: "default".to_string(),
                }),
        }
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched from the kiosk thread, behind the
/// `Option` owned by `CpalAudioSource`.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone source producing 16kHz mono i16 samples.
///
/// The stream runs at the device's native format and is mixed down and
/// resampled in the callback.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    buffer: Arc<Mutex<Vec<i16>>>,
    target_rate: u32,
}

impl CpalAudioSource {
    /// Open the named input device, or the system default when `None`.
    ///
    /// # Errors
    /// `AudioDeviceNotFound` if the device does not exist.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = find_input_device(device_name)?;
        if let Ok(name) = device.name() {
            tracing::info!("using microphone '{}'", name);
        }
        Ok(Self {
            device,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            target_rate: defaults::SAMPLE_RATE,
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let native = self
            .device
            .default_input_config()
            .map_err(|e| KioskError::AudioCapture {
                message: format!("Failed to query default input config: {}", e),
            })?;
        let channels = native.channels() as usize;
        let source_rate = native.sample_rate().0;
        let target_rate = self.target_rate;
        let stream_config: cpal::StreamConfig = native.clone().into();
        let on_error = |err| tracing::warn!("audio stream error: {}", err);

        let buffer = Arc::clone(&self.buffer);
        let stream = match native.sample_format() {
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    push_converted(&buffer, data, channels, source_rate, target_rate);
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let pcm: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    push_converted(&buffer, &pcm, channels, source_rate, target_rate);
                },
                on_error,
                None,
            ),
            other => {
                return Err(KioskError::AudioCapture {
                    message: format!("Unsupported native sample format: {:?}", other),
                });
            }
        };

        stream.map_err(|e| KioskError::AudioCapture {
            message: format!("Failed to build input stream: {}", e),
        })
    }
}

fn push_converted(
    buffer: &Arc<Mutex<Vec<i16>>>,
    data: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) {
    let converted = resample(&mix_to_mono(data, channels), source_rate, target_rate);
    if let Ok(mut buf) = buffer.lock() {
        buf.extend_from_slice(&converted);
        if buf.len() > MAX_BUFFERED_SAMPLES {
            let excess = buf.len() - MAX_BUFFERED_SAMPLES;
            buf.drain(..excess);
        }
    }
}

/// Average interleaved channels into one.
fn mix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampler.
fn resample(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples.get(idx + 1).copied().unwrap_or(samples[idx]) as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        let stream = self.build_stream()?;
        stream.play().map_err(|e| KioskError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.0.pause().map_err(|e| KioskError::AudioCapture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut buffer = self.buffer.lock().map_err(|e| KioskError::AudioCapture {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;
        Ok(std::mem::take(&mut *buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_to_mono_averages_channels() {
        let stereo = vec![100i16, 300, -200, 200];
        assert_eq!(mix_to_mono(&stereo, 2), vec![200, 0]);
        assert_eq!(mix_to_mono(&stereo, 1), stereo);
    }

    #[test]
    fn test_resample_48k_to_16k_keeps_a_third() {
        let samples: Vec<i16> = (0..48).map(|i| i as i16 * 10).collect();
        let out = resample(&samples, 48000, 16000);
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 30);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_push_converted_caps_buffer() {
        let buffer = Arc::new(Mutex::new(vec![0i16; MAX_BUFFERED_SAMPLES]));
        push_converted(&buffer, &[5i16; 10], 1, 16000, 16000);
        let buf = buffer.lock().unwrap();
        assert_eq!(buf.len(), MAX_BUFFERED_SAMPLES);
        assert_eq!(buf[buf.len() - 1], 5);
    }

    #[test]
    fn test_create_with_invalid_device_name() {
        match CpalAudioSource::new(Some("NonExistentDevice12345")) {
            Err(KioskError::AudioDeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            Err(KioskError::AudioCapture { .. }) => {} // no audio host in CI
            Ok(_) => panic!("Expected AudioDeviceNotFound error"),
            Err(other) => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_start_read_stop_with_default_device() {
        let mut source = CpalAudioSource::new(None).expect("Failed to create audio source");
        source.start().expect("start");
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(source.read_samples().is_ok());
        source.stop().expect("stop");
    }
}
