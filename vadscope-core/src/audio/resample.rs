//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Uploads decode at whatever rate the file was recorded at (44.1 kHz is
//! common). The detector and the widget both work on 16 kHz mono, so the
//! loader converts the whole decoded buffer in one pass. `RateConverter`
//! feeds rubato fixed-size chunks, drains the resampler's internal delay at
//! the end, and trims the output to exactly `round(frames * ratio)` frames so
//! `duration == frames / target_rate` survives the conversion.
//!
//! When source rate == target rate the converter is a passthrough — no rubato
//! session is created at all.
//!
//! The conversion is deterministic: fixed ratio, cubic interpolation, no
//! dither. The same input buffer always yields the same output buffer.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{Result, VadScopeError};

/// Input frame count per rubato call.
const CHUNK: usize = 1024;

/// Converts a whole f32 mono buffer from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// `target_rate / source_rate`.
    ratio: f64,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a new converter from `source_rate` to `target_rate` (Hz).
    ///
    /// # Errors
    /// Returns `VadScopeError::Resample` if rubato fails to initialise.
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                ratio: 1.0,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio — no dynamic adjustment
            PolynomialDegree::Cubic,
            CHUNK,
            1, // mono
        )
        .map_err(|e| VadScopeError::Resample(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        Ok(Self {
            resampler: Some(resampler),
            ratio,
            output_buf,
        })
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Convert the whole buffer, consuming the converter.
    ///
    /// In passthrough mode the input is returned unchanged. Otherwise the
    /// output holds exactly `round(samples.len() * ratio)` frames, with the
    /// resampler's startup delay trimmed off the front.
    pub fn convert(mut self, samples: Vec<f32>) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(samples);
        };

        let expected = (samples.len() as f64 * self.ratio).round() as usize;
        let delay = resampler.output_delay();
        let mut out: Vec<f32> = Vec::with_capacity(expected + delay);

        let mut pos = 0;
        while samples.len() - pos >= CHUNK {
            let (_, produced) = resampler
                .process_into_buffer(&[&samples[pos..pos + CHUNK]], &mut self.output_buf, None)
                .map_err(|e| VadScopeError::Resample(format!("resampler process: {e}")))?;
            out.extend_from_slice(&self.output_buf[0][..produced]);
            pos += CHUNK;
        }

        // Trailing partial chunk, then zero-fed calls until the delayed tail
        // has fully drained.
        if pos < samples.len() {
            let (_, produced) = resampler
                .process_partial_into_buffer(Some(&[&samples[pos..]]), &mut self.output_buf, None)
                .map_err(|e| VadScopeError::Resample(format!("resampler flush: {e}")))?;
            out.extend_from_slice(&self.output_buf[0][..produced]);
        }
        while out.len() < expected + delay {
            let (_, produced) = resampler
                .process_partial_into_buffer(
                    Option::<&[Vec<f32>]>::None,
                    &mut self.output_buf,
                    None,
                )
                .map_err(|e| VadScopeError::Resample(format!("resampler flush: {e}")))?;
            if produced == 0 {
                break;
            }
            out.extend_from_slice(&self.output_buf[0][..produced]);
        }

        out.drain(..delay.min(out.len()));
        out.truncate(expected);
        Ok(out)
    }
}
