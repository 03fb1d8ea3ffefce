//! Speech detection abstraction.
//!
//! The `SpeechSegmenter` trait is the seam between the core and whatever
//! model finds speech: swap in `EnergySegmenter` (default), `SileroSegmenter`
//! (`onnx` feature), or any future neural VAD without touching the loader or
//! the mapper. The host owns one detector per process via `DetectorHandle`.

pub mod energy;

#[cfg(feature = "onnx")]
pub mod silero;

#[cfg(feature = "onnx")]
pub use silero::{SileroConfig, SileroSegmenter};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::error::Result;

/// A detected stretch of speech, in samples of the analyzed waveform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSpan {
    /// First sample of the span (inclusive).
    pub start: usize,
    /// One past the last sample of the span.
    pub end: usize,
    /// Class label; `None` means the default `"SPEECH"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SpeechSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            label: None,
        }
    }

    pub fn labeled(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: Some(label.into()),
        }
    }

    /// Span length in samples.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Trait for all offline speech detectors.
///
/// Implementors may keep state between windows (RNN hidden states, hangover
/// counters); `segment` must reset that state itself so one call per upload
/// is self-contained.
pub trait SpeechSegmenter: Send + 'static {
    /// Find speech spans in a mono waveform.
    ///
    /// Returned spans are ordered, disjoint, and bounded by the waveform
    /// length. An all-silence waveform yields an empty vec, not an error.
    fn segment(&mut self, waveform: &Waveform) -> Result<Vec<SpeechSpan>>;
}

/// Thread-safe reference-counted handle to any `SpeechSegmenter`.
///
/// The host constructs one at startup and reuses it for the life of the
/// process; the `parking_lot::Mutex` serializes detector state across
/// requests.
#[derive(Clone)]
pub struct DetectorHandle(pub Arc<Mutex<dyn SpeechSegmenter>>);

impl DetectorHandle {
    /// Wrap any `SpeechSegmenter` in a `DetectorHandle`.
    pub fn new<S: SpeechSegmenter>(segmenter: S) -> Self {
        Self(Arc::new(Mutex::new(segmenter)))
    }

    /// Run the wrapped segmenter over one waveform.
    pub fn segment(&self, waveform: &Waveform) -> Result<Vec<SpeechSpan>> {
        self.0.lock().segment(waveform)
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle").finish_non_exhaustive()
    }
}
