//! In-memory WAV serialization + base64 data URI for the waveform widget.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::Waveform;
use crate::error::{Result, VadScopeError};

/// Keeps peak normalization finite on silent input.
const PEAK_EPSILON: f32 = 1e-8;

/// MIME prefix the widget's `<audio>` backend understands.
const DATA_URI_PREFIX: &str = "data:audio/x-wav;base64,";

/// Encode a waveform as a self-contained `data:audio/x-wav;base64,` URI.
///
/// Samples are peak-normalized into a copy — `s / (max|s| + 1e-8)` — so the
/// loudest sample lands at ±1.0 and the caller's buffer is never touched.
/// The container is uncompressed 32-bit float PCM, written entirely in
/// memory. Deterministic: the same waveform always yields the same string.
pub fn encode_data_uri(waveform: &Waveform) -> Result<String> {
    let normalized = peak_normalized(&waveform.samples);

    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| VadScopeError::Encode(format!("wav header: {e}")))?;
        for &sample in &normalized {
            writer
                .write_sample(sample)
                .map_err(|e| VadScopeError::Encode(format!("wav body: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| VadScopeError::Encode(format!("wav finalize: {e}")))?;
    }

    let mut uri = String::from(DATA_URI_PREFIX);
    STANDARD.encode_string(cursor.into_inner(), &mut uri);
    Ok(uri)
}

fn peak_normalized(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let scale = 1.0 / (peak + PEAK_EPSILON);
    samples.iter().map(|s| s * scale).collect()
}
