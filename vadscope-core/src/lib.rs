//! # vadscope-core
//!
//! Voice-activity visualization engine.
//!
//! ## Architecture
//!
//! ```text
//! upload bytes → AudioLoader (probe → decode → downmix → resample)
//!                     │
//!                  Waveform ──► encode_data_uri ──► audio data URI
//!                     │
//!           SpeechSegmenter::segment
//!                     │
//!            Vec<SpeechSpan> ──► map_spans ──► regions + legend ──► markup
//! ```
//!
//! Decoding errors surface before the detector runs. The detector handle is
//! the only process-wide state; everything derived from an upload is
//! request-local.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod encode;
pub mod error;
pub mod render;
pub mod vad;

// Convenience re-exports for downstream crates
pub use audio::{AudioLoader, LoaderConfig, SourceInfo, Waveform};
pub use encode::encode_data_uri;
pub use error::VadScopeError;
pub use render::{map_spans, LabelColorMap, LegendEntry, Region};
pub use vad::{energy::EnergySegmenter, DetectorHandle, SpeechSegmenter, SpeechSpan};

#[cfg(feature = "onnx")]
pub use vad::{SileroConfig, SileroSegmenter};
