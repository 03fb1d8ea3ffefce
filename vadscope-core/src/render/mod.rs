//! Mapping detector output onto waveform-widget regions.
//!
//! Spans are sample-indexed; the widget wants seconds, a color, and flags
//! telling it to keep regions static. Colors come from an ordered label →
//! color map populated in first-seen order, so the whole mapping is a pure
//! function of the span sequence.

pub mod markup;

use serde::{Deserialize, Serialize};

use crate::vad::SpeechSpan;

/// Translucent region fills, assigned to labels in first-seen order.
pub const PALETTE: [&str; 8] = [
    "#ffd70033", "#00ffff33", "#ff00ff33", "#00ff0033", "#9932cc33", "#00bfff33", "#ff7f5033",
    "#66cdaa33",
];

/// Label applied to spans that do not carry their own.
pub const DEFAULT_LABEL: &str = "SPEECH";

/// A widget region in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub start_secs: f64,
    pub end_secs: f64,
    /// Translucent fill color, e.g. `#ffd70033`.
    pub color: String,
    pub label: String,
    /// The widget must not let the user resize this region.
    pub resizable: bool,
    /// The widget must not let the user drag this region.
    pub draggable: bool,
}

/// One legend row: a color swatch and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// Ordered label → color assignment.
///
/// Seeded with `SPEECH` on the first palette color; an unseen label takes
/// the next unused color, cycling when the palette runs out, and keeps it
/// for the rest of the run.
#[derive(Debug, Clone)]
pub struct LabelColorMap {
    entries: Vec<(String, String)>,
    next: usize,
}

impl LabelColorMap {
    pub fn new() -> Self {
        Self {
            entries: vec![(DEFAULT_LABEL.to_string(), PALETTE[0].to_string())],
            next: 1,
        }
    }

    /// Color for `label`, assigning a palette slot on first sight.
    pub fn color_for(&mut self, label: &str) -> String {
        if let Some((_, color)) = self.entries.iter().find(|(known, _)| known == label) {
            return color.clone();
        }
        let color = PALETTE[self.next % PALETTE.len()].to_string();
        self.next += 1;
        self.entries.push((label.to_string(), color.clone()));
        color
    }

    /// Labels seen so far, in assignment order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }
}

impl Default for LabelColorMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert sample-indexed spans to second-indexed regions plus a legend.
///
/// One region per span, order preserved; `start_secs = start / rate`. The
/// legend lists distinct labels in first-seen order, each exactly once.
/// An empty span sequence yields empty regions and an empty legend.
pub fn map_spans(
    spans: &[SpeechSpan],
    sample_rate: u32,
    colors: &mut LabelColorMap,
) -> (Vec<Region>, Vec<LegendEntry>) {
    let mut regions = Vec::with_capacity(spans.len());
    let mut legend: Vec<LegendEntry> = Vec::new();

    for span in spans {
        let label = span.label.as_deref().unwrap_or(DEFAULT_LABEL);
        let color = colors.color_for(label);

        if !legend.iter().any(|entry| entry.label == label) {
            legend.push(LegendEntry {
                label: label.to_string(),
                color: color.clone(),
            });
        }

        regions.push(Region {
            start_secs: span.start as f64 / sample_rate as f64,
            end_secs: span.end as f64 / sample_rate as f64,
            color,
            label: label.to_string(),
            resizable: false,
            draggable: false,
        });
    }

    (regions, legend)
}
