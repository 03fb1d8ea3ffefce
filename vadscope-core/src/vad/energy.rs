//! Energy-based speech segmentation using RMS threshold + hangover.
//!
//! ## Algorithm
//!
//! 1. Slice the waveform into fixed-length frames.
//! 2. A frame with RMS ≥ `threshold` is speech; after speech, up to
//!    `hangover_frames` below-threshold frames still count as speech
//!    (prevents clipping syllable endings and splitting short pauses).
//! 3. Consecutive speech frames merge into one span; spans shorter than
//!    `min_speech_frames` frames are dropped.

use super::{SpeechSegmenter, SpeechSpan};
use crate::audio::Waveform;
use crate::error::Result;

/// A simple energy-based offline speech segmenter.
#[derive(Debug, Clone)]
pub struct EnergySegmenter {
    /// RMS amplitude threshold. Frames above this are considered speech.
    /// Typical range: 0.01–0.05 for conversational recordings.
    threshold: f32,
    /// Frame length in samples (32 ms at 16 kHz by default).
    frame_len: usize,
    /// How many consecutive below-threshold frames still count as speech
    /// after real speech ends.
    hangover_frames: u32,
    /// Minimum span length, in frames. Shorter spans are dropped as clicks.
    min_speech_frames: usize,
}

impl EnergySegmenter {
    /// Create a new `EnergySegmenter`.
    ///
    /// # Parameters
    /// - `threshold`: RMS level above which a frame is considered speech.
    ///   Default: `0.02`.
    /// - `hangover_frames`: Number of silent frames to extend speech
    ///   detection. Default: `8` (≈ 256 ms at the default frame length).
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            threshold,
            frame_len: 512,
            hangover_frames,
            min_speech_frames: 2,
        }
    }

    /// Compute the root-mean-square of a sample slice.
    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl Default for EnergySegmenter {
    fn default() -> Self {
        Self::new(0.02, 8)
    }
}

impl SpeechSegmenter for EnergySegmenter {
    fn segment(&mut self, waveform: &Waveform) -> Result<Vec<SpeechSpan>> {
        let samples = &waveform.samples;
        let min_len = self.min_speech_frames * self.frame_len;

        let mut spans = Vec::new();
        let mut current: Option<SpeechSpan> = None;
        let mut hangover = 0u32;

        let mut pos = 0;
        while pos < samples.len() {
            let end = (pos + self.frame_len).min(samples.len());
            let rms = Self::rms(&samples[pos..end]);

            let active = if rms >= self.threshold {
                hangover = self.hangover_frames;
                true
            } else if hangover > 0 {
                hangover -= 1;
                true
            } else {
                false
            };

            if active {
                match current {
                    Some(ref mut span) => span.end = end,
                    None => current = Some(SpeechSpan::new(pos, end)),
                }
            } else if let Some(span) = current.take() {
                if span.len() >= min_len {
                    spans.push(span);
                }
            }

            pos = end;
        }

        if let Some(span) = current.take() {
            if span.len() >= min_len {
                spans.push(span);
            }
        }

        Ok(spans)
    }
}
