//! Silero VAD neural speech segmenter.
//!
//! Wraps the Silero VAD ONNX model published at
//! <https://github.com/snakers4/silero-vad>, run offline over a whole
//! waveform: every 512-sample window produces a speech probability, and a
//! hysteresis pass merges the probability sequence into sample spans.
//!
//! Supports both the v3/v4 LSTM interface (separate `h`/`c` tensors) and the
//! v5 GRU interface (single `state` tensor); tensor names are resolved from
//! the model at load time, falling back to stateless invocation when no
//! recognizable state tensors exist.

use std::path::PathBuf;

use ndarray::{Array1, Array2, Array3};
use ort::session::builder::SessionBuilder;
use ort::session::SessionInputValue;
use ort::value::Value;
use tracing::info;

use super::{SpeechSegmenter, SpeechSpan};
use crate::audio::Waveform;
use crate::error::{Result, VadScopeError};

/// Window size expected by Silero VAD (samples at 16 kHz = 32 ms).
const WINDOW: usize = 512;
/// v3/v4 LSTM state size: 2 layers × 1 batch × 64 units (each of h and c).
const LSTM_SIZE: usize = 128;
/// v5 GRU state size: 2 layers × 1 batch × 128 units.
const GRU_STATE_SIZE: usize = 256;

/// Hysteresis parameters for turning window probabilities into spans.
///
/// Defaults follow the reference `get_speech_timestamps` utilities.
#[derive(Debug, Clone)]
pub struct SileroConfig {
    /// Speech probability threshold in [0, 1]. Default: 0.5.
    pub threshold: f32,
    /// Spans shorter than this are dropped. Default: 250 ms.
    pub min_speech_ms: u32,
    /// Silence shorter than this does not close a span. Default: 100 ms.
    pub min_silence_ms: u32,
    /// Padding added to both ends of every span. Default: 30 ms.
    pub speech_pad_ms: u32,
}

impl Default for SileroConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_speech_ms: 250,
            min_silence_ms: 100,
            speech_pad_ms: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelIoMode {
    /// v3/v4 LSTM: separate `h` and `c` [2,1,64] state tensors.
    Lstm,
    /// v5 GRU: single `state` [2,1,128] tensor.
    Gru,
    /// No state passing.
    Stateless,
}

/// Offline neural speech segmenter backed by the Silero VAD ONNX model.
pub struct SileroSegmenter {
    session: ort::session::Session,
    config: SileroConfig,
    io_mode: ModelIoMode,
    input_name: String,
    sr_name: Option<String>,
    output_name: String,
    state_in_names: Vec<String>,
    state_out_names: Vec<String>,
    // LSTM h/c or GRU state, flattened row-major.
    state: Vec<Vec<f32>>,
}

impl SileroSegmenter {
    /// Load the Silero VAD ONNX model from `path`.
    pub fn new(path: impl AsRef<std::path::Path>, config: SileroConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VadScopeError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(|e| VadScopeError::OnnxSession(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| VadScopeError::OnnxSession(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        let input_name = resolve_name(&input_names, &["input", "audio", "x"])
            .or_else(|| input_names.first().cloned())
            .ok_or_else(|| VadScopeError::OnnxSession("Silero model has no inputs".into()))?;
        let sr_name = resolve_name(&input_names, &["sr", "sample_rate"]);
        let output_name = resolve_name(&output_names, &["output", "speech_prob", "prob"])
            .or_else(|| output_names.first().cloned())
            .ok_or_else(|| VadScopeError::OnnxSession("Silero model has no outputs".into()))?;

        let h = resolve_name(&input_names, &["h", "state_h"]);
        let c = resolve_name(&input_names, &["c", "state_c"]);
        let hn = resolve_name(&output_names, &["hn", "state_hn", "h_out"]);
        let cn = resolve_name(&output_names, &["cn", "state_cn", "c_out"]);
        let gru_in = resolve_name(&input_names, &["state", "h_0", "hidden"]);
        let gru_out = resolve_name(&output_names, &["stateN", "state_out", "hn_out"]);

        let (io_mode, state_in_names, state_out_names, state) =
            match (h, c, hn, cn, gru_in, gru_out) {
                (Some(h), Some(c), Some(hn), Some(cn), _, _) => (
                    ModelIoMode::Lstm,
                    vec![h, c],
                    vec![hn, cn],
                    vec![vec![0.0; LSTM_SIZE]; 2],
                ),
                (_, _, _, _, Some(i), Some(o)) => (
                    ModelIoMode::Gru,
                    vec![i],
                    vec![o],
                    vec![vec![0.0; GRU_STATE_SIZE]],
                ),
                _ => (ModelIoMode::Stateless, vec![], vec![], vec![]),
            };

        info!(
            path = %path.display(),
            ?io_mode,
            threshold = config.threshold,
            "Silero VAD model loaded"
        );

        Ok(Self {
            session,
            config,
            io_mode,
            input_name,
            sr_name,
            output_name,
            state_in_names,
            state_out_names,
            state,
        })
    }

    /// Conventional location for the model file.
    pub fn default_model_path() -> PathBuf {
        PathBuf::from("models").join("silero_vad.onnx")
    }

    fn reset_state(&mut self) {
        for buf in &mut self.state {
            buf.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    fn state_shape(&self) -> (usize, usize, usize) {
        match self.io_mode {
            ModelIoMode::Lstm => (2, 1, 64),
            ModelIoMode::Gru => (2, 1, 128),
            ModelIoMode::Stateless => (0, 0, 0),
        }
    }

    /// Run one 512-sample window through the model, updating the recurrent
    /// state and returning the speech probability.
    fn run_window(&mut self, window: &[f32], sample_rate: u32) -> Result<f32> {
        debug_assert_eq!(window.len(), WINDOW);

        let onnx_err = |e: ort::Error| VadScopeError::OnnxSession(e.to_string());
        let shape_err = |e: ndarray::ShapeError| VadScopeError::OnnxSession(e.to_string());

        let input_arr =
            Array2::<f32>::from_shape_vec((1, WINDOW), window.to_vec()).map_err(shape_err)?;
        let mut inputs: Vec<(String, SessionInputValue<'_>)> = vec![(
            self.input_name.clone(),
            Value::from_array(input_arr).map_err(onnx_err)?.into(),
        )];

        if let Some(sr_name) = &self.sr_name {
            let sr_arr = Array1::<i64>::from_elem(1, sample_rate as i64);
            inputs.push((
                sr_name.clone(),
                Value::from_array(sr_arr).map_err(onnx_err)?.into(),
            ));
        }

        let shape = self.state_shape();
        for (name, buf) in self.state_in_names.iter().zip(&self.state) {
            let arr = Array3::<f32>::from_shape_vec(shape, buf.clone()).map_err(shape_err)?;
            inputs.push((name.clone(), Value::from_array(arr).map_err(onnx_err)?.into()));
        }

        let outputs = self.session.run(inputs).map_err(onnx_err)?;

        let prob_output = outputs
            .get(self.output_name.as_str())
            .unwrap_or(&outputs[0]);
        let (_, prob_data) = prob_output
            .try_extract_tensor::<f32>()
            .map_err(onnx_err)?;
        let prob = prob_data.first().copied().unwrap_or(0.0);

        for (name, buf) in self.state_out_names.iter().zip(&mut self.state) {
            let out = outputs.get(name.as_str()).ok_or_else(|| {
                VadScopeError::OnnxSession(format!("missing state output `{name}`"))
            })?;
            let (_, data) = out.try_extract_tensor::<f32>().map_err(onnx_err)?;
            buf.clear();
            buf.extend_from_slice(data);
        }

        Ok(prob)
    }
}

impl SpeechSegmenter for SileroSegmenter {
    fn segment(&mut self, waveform: &Waveform) -> Result<Vec<SpeechSpan>> {
        let rate = waveform.sample_rate;
        if rate != 8_000 && rate != 16_000 {
            return Err(VadScopeError::Inference(format!(
                "Silero VAD expects 8 or 16 kHz audio, got {rate} Hz"
            )));
        }

        self.reset_state();

        let mut probs = Vec::with_capacity(waveform.frames().div_ceil(WINDOW));
        let mut window = [0f32; WINDOW];
        for chunk in waveform.samples.chunks(WINDOW) {
            window[..chunk.len()].copy_from_slice(chunk);
            window[chunk.len()..].fill(0.0);
            probs.push(self.run_window(&window, rate)?);
        }

        Ok(spans_from_probabilities(
            &probs,
            waveform.frames(),
            rate,
            &self.config,
        ))
    }
}

fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
    preferred.iter().find_map(|needle| {
        candidates
            .iter()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .cloned()
    })
}

/// Merge per-window speech probabilities into padded sample spans.
///
/// A span opens when a window reaches `threshold` and closes once the
/// probability stays under `threshold - 0.15` for `min_silence_ms`. Spans
/// shorter than `min_speech_ms` are dropped, survivors get `speech_pad_ms`
/// on both ends, clamped so consecutive spans never overlap.
fn spans_from_probabilities(
    probs: &[f32],
    total_frames: usize,
    sample_rate: u32,
    config: &SileroConfig,
) -> Vec<SpeechSpan> {
    let per_ms = sample_rate as usize / 1_000;
    let min_speech = config.min_speech_ms as usize * per_ms;
    let min_silence = config.min_silence_ms as usize * per_ms;
    let pad = config.speech_pad_ms as usize * per_ms;
    let neg_threshold = (config.threshold - 0.15).max(0.01);

    let mut spans: Vec<SpeechSpan> = Vec::new();
    let mut start = 0usize;
    let mut in_speech = false;
    let mut silence_from: Option<usize> = None;

    for (i, &prob) in probs.iter().enumerate() {
        let offset = (i * WINDOW).min(total_frames);

        if prob >= config.threshold {
            if !in_speech {
                in_speech = true;
                start = offset;
            }
            silence_from = None;
        } else if in_speech && prob < neg_threshold {
            let from = *silence_from.get_or_insert(offset);
            if offset + WINDOW - from >= min_silence {
                if from - start >= min_speech {
                    spans.push(SpeechSpan::new(start, from));
                }
                in_speech = false;
                silence_from = None;
            }
        }
    }

    if in_speech {
        let end = total_frames;
        if end - start >= min_speech {
            spans.push(SpeechSpan::new(start, end));
        }
    }

    // Pad spans outward; a gap narrower than 2×pad is split between its
    // neighbours so spans never collide.
    let n = spans.len();
    for i in 0..n {
        if i == 0 {
            spans[0].start = spans[0].start.saturating_sub(pad);
        }
        if i + 1 < n {
            let gap = spans[i + 1].start - spans[i].end;
            if gap < 2 * pad {
                spans[i].end += gap / 2;
                spans[i + 1].start -= gap - gap / 2;
            } else {
                spans[i].end += pad;
                spans[i + 1].start -= pad;
            }
        } else {
            spans[i].end = (spans[i].end + pad).min(total_frames);
        }
    }

    spans
}
