//! Upload decoding and normalization.
//!
//! # Design constraints
//!
//! Uploads arrive as raw bytes in an arbitrary container (wav, mp3, flac,
//! ogg, …) at an arbitrary rate and channel count. `AudioLoader` turns them
//! into the one shape the rest of the crate understands: mono f32 at the
//! configured target rate.
//!
//! The cheap `probe` path validates the container and bounds the declared
//! duration *before* any packet is decoded, so garbage or oversized uploads
//! are rejected before the detector ever runs. Containers that do not declare
//! a frame count (streamy mp3s) are bounded again inside the decode loop.
//!
//! Channel downmix policy: arithmetic mean across channels, every call.

pub mod resample;
pub mod waveform;

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use crate::error::{Result, VadScopeError};
use resample::RateConverter;
pub use waveform::Waveform;

/// Limits and target format for `AudioLoader`.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Sample rate every upload is normalized to (Hz). Default: 16000.
    pub target_sample_rate: u32,
    /// Uploads longer than this are rejected. Default: 600 s.
    pub max_duration_secs: f64,
    /// Uploads larger than this are rejected before probing. Default: 64 MiB.
    pub max_input_bytes: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            max_duration_secs: 600.0,
            max_input_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Container metadata from the cheap probe path.
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo {
    /// Source sample rate (Hz), before normalization.
    pub sample_rate: u32,
    /// Source channel count.
    pub channels: usize,
    /// Frame count, when the container declares one (wav and flac do,
    /// mp3 often does not).
    pub frames: Option<u64>,
    /// `frames / sample_rate`, when the frame count is known.
    pub duration_secs: Option<f64>,
}

/// Decodes uploaded bytes into a mono waveform at the target rate.
pub struct AudioLoader {
    config: LoaderConfig,
}

impl AudioLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Cheap format/duration check: probes the container without decoding
    /// any audio packet.
    ///
    /// # Errors
    /// `VadScopeError::Decode` on empty input, input over the byte cap, an
    /// unrecognizable container, or a declared duration over the cap.
    pub fn probe(&self, bytes: &[u8]) -> Result<SourceInfo> {
        let format = self.open_format(bytes)?;
        let info = track_info(format.as_ref())?;
        self.check_duration(info.duration_secs)?;
        Ok(info)
    }

    /// Decode, downmix, and resample an upload into a `Waveform`.
    ///
    /// Runs the same validation prefix as [`probe`](Self::probe), so callers
    /// that already probed pay the container scan twice but decode once.
    ///
    /// # Errors
    /// `VadScopeError::Decode` for anything wrong with the bytes;
    /// `VadScopeError::Resample` if rate conversion fails.
    pub fn load(&self, bytes: &[u8]) -> Result<Waveform> {
        let mut format = self.open_format(bytes)?;
        let info = track_info(format.as_ref())?;
        self.check_duration(info.duration_secs)?;

        let interleaved = self.decode_track(format.as_mut(), info)?;
        if interleaved.is_empty() {
            return Err(VadScopeError::Decode(
                "the file contains no audio samples".into(),
            ));
        }

        let mono = downmix(&interleaved, info.channels)?;
        let samples =
            RateConverter::new(info.sample_rate, self.config.target_sample_rate)?.convert(mono)?;

        info!(
            source_rate = info.sample_rate,
            channels = info.channels,
            frames = samples.len(),
            "upload decoded and normalized"
        );

        Ok(Waveform::new(samples, self.config.target_sample_rate))
    }

    fn open_format(&self, bytes: &[u8]) -> Result<Box<dyn FormatReader>> {
        if bytes.is_empty() {
            return Err(VadScopeError::Decode("the uploaded file is empty".into()));
        }
        if bytes.len() > self.config.max_input_bytes {
            return Err(VadScopeError::Decode(format!(
                "the uploaded file is {} bytes; the limit is {} bytes",
                bytes.len(),
                self.config.max_input_bytes
            )));
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &Hint::new(),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                VadScopeError::Decode(format!("the file is not a recognized audio format ({e})"))
            })?;
        Ok(probed.format)
    }

    fn check_duration(&self, duration_secs: Option<f64>) -> Result<()> {
        if let Some(duration) = duration_secs {
            if duration > self.config.max_duration_secs {
                return Err(VadScopeError::Decode(format!(
                    "the audio is {duration:.1} s long; the limit is {:.0} s",
                    self.config.max_duration_secs
                )));
            }
        }
        Ok(())
    }

    /// Decode the whole selected track into interleaved f32 samples,
    /// enforcing the duration cap as frames accumulate.
    fn decode_track(&self, format: &mut dyn FormatReader, info: SourceInfo) -> Result<Vec<f32>> {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| VadScopeError::Decode("the file has no audio track".into()))?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| VadScopeError::Decode(format!("unsupported audio codec ({e})")))?;

        let max_frames = (self.config.max_duration_secs * info.sample_rate as f64) as usize;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(VadScopeError::Decode(format!(
                        "the file is truncated or corrupt ({e})"
                    )))
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                // A single bad packet is recoverable; skip it.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("skipping undecodable packet: {e}");
                    continue;
                }
                Err(e) => {
                    return Err(VadScopeError::Decode(format!(
                        "the audio stream could not be decoded ({e})"
                    )))
                }
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());

            if samples.len() / info.channels.max(1) > max_frames {
                return Err(VadScopeError::Decode(format!(
                    "the audio exceeds the {:.0} s limit",
                    self.config.max_duration_secs
                )));
            }
        }

        Ok(samples)
    }
}

fn track_info(format: &dyn FormatReader) -> Result<SourceInfo> {
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| VadScopeError::Decode("the file has no audio track".into()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| VadScopeError::Decode("the file does not declare a sample rate".into()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let frames = track.codec_params.n_frames;
    let duration_secs = frames.map(|n| n as f64 / sample_rate as f64);

    Ok(SourceInfo {
        sample_rate,
        channels,
        frames,
        duration_secs,
    })
}

/// Mix interleaved samples down to mono by averaging across channels.
fn downmix(samples: &[f32], channels: usize) -> Result<Vec<f32>> {
    if channels == 0 {
        return Err(VadScopeError::Decode("invalid channel count: 0".into()));
    }
    if channels == 1 {
        return Ok(samples.to_vec());
    }
    if samples.len() % channels != 0 {
        return Err(VadScopeError::Decode(format!(
            "decoded sample count {} is not divisible by {} channels",
            samples.len(),
            channels
        )));
    }

    let mut mono = Vec::with_capacity(samples.len() / channels);
    for frame in samples.chunks_exact(channels) {
        let sum: f32 = frame.iter().sum();
        mono.push(sum / channels as f32);
    }
    Ok(mono)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn wav_bytes(channels: u16, sample_rate: u32, frames: &[Vec<f32>]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for frame in frames {
                for &sample in frame {
                    writer.write_sample(sample).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn mono_wav(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        wav_bytes(1, sample_rate, &samples.iter().map(|&s| vec![s]).collect::<Vec<_>>())
    }

    #[test]
    fn mono_16k_wav_loads_unchanged() {
        let samples: Vec<f32> = (0..16_000).map(|i| (i as f32 * 0.01).sin() * 0.4).collect();
        let loader = AudioLoader::new(LoaderConfig::default());

        let wf = loader.load(&mono_wav(16_000, &samples)).unwrap();
        assert_eq!(wf.sample_rate, 16_000);
        assert_eq!(wf.frames(), samples.len());
        assert_relative_eq!(wf.duration_secs(), 1.0);
        assert!((wf.samples[100] - samples[100]).abs() < 1e-6);
    }

    #[test]
    fn stereo_downmix_is_channel_mean() {
        let frames: Vec<Vec<f32>> = (0..8_000).map(|_| vec![0.2, 0.6]).collect();
        let loader = AudioLoader::new(LoaderConfig::default());

        let wf = loader.load(&wav_bytes(2, 16_000, &frames)).unwrap();
        assert_eq!(wf.frames(), 8_000);
        for &s in &wf.samples {
            assert!((s - 0.4).abs() < 1e-6, "expected mean 0.4, got {s}");
        }
    }

    #[test]
    fn high_rate_wav_resamples_to_target() {
        let samples = vec![0.1f32; 48_000];
        let loader = AudioLoader::new(LoaderConfig::default());

        let wf = loader.load(&mono_wav(48_000, &samples)).unwrap();
        assert_eq!(wf.sample_rate, 16_000);
        assert_eq!(wf.frames(), 16_000);
        assert_relative_eq!(wf.duration_secs(), 1.0);
    }

    #[test]
    fn empty_input_is_rejected() {
        let loader = AudioLoader::new(LoaderConfig::default());
        let err = loader.load(&[]).unwrap_err();
        assert!(matches!(err, VadScopeError::Decode(_)), "got {err:?}");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn garbage_input_is_rejected() {
        let loader = AudioLoader::new(LoaderConfig::default());
        let err = loader.load(b"definitely not audio data").unwrap_err();
        assert!(matches!(err, VadScopeError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn oversized_input_is_rejected_before_probing() {
        let config = LoaderConfig {
            max_input_bytes: 64,
            ..LoaderConfig::default()
        };
        let loader = AudioLoader::new(config);
        let bytes = mono_wav(16_000, &vec![0.0; 1_000]);
        let err = loader.probe(&bytes).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn over_duration_input_is_rejected_at_probe() {
        let config = LoaderConfig {
            max_duration_secs: 0.25,
            ..LoaderConfig::default()
        };
        let loader = AudioLoader::new(config);
        let bytes = mono_wav(16_000, &vec![0.0; 16_000]); // 1 s
        let err = loader.probe(&bytes).unwrap_err();
        assert!(matches!(err, VadScopeError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn probe_reports_source_metadata_without_decoding() {
        let loader = AudioLoader::new(LoaderConfig::default());
        let bytes = wav_bytes(2, 44_100, &(0..4_410).map(|_| vec![0.0, 0.0]).collect::<Vec<_>>());

        let info = loader.probe(&bytes).unwrap();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.frames, Some(4_410));
        assert_relative_eq!(info.duration_secs.unwrap(), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn downmix_rejects_ragged_interleaving() {
        let err = downmix(&[0.0, 0.1, 0.2], 2).unwrap_err();
        assert!(matches!(err, VadScopeError::Decode(_)));
    }
}
