//! HTML/JS fragment generation for the waveform widget page.
//!
//! The host's template carries two placeholder tokens, `BASE64` and
//! `REGIONS`; everything here is literal string substitution so the template
//! stays editable without touching Rust.

use std::fmt::Write as _;

use super::{LegendEntry, Region};

/// Template token replaced by the audio data URI.
pub const BASE64_TOKEN: &str = "BASE64";
/// Template token replaced by the region-creation statements.
pub const REGIONS_TOKEN: &str = "REGIONS";

/// One `wavesurfer.addRegion` statement per region, in order.
pub fn region_statements(regions: &[Region]) -> String {
    let mut out = String::new();
    for region in regions {
        let _ = write!(
            out,
            "var re = wavesurfer.addRegion({{start: {}, end: {}, color: '{}', resize : {}, drag : {}}});",
            format_secs(region.start_secs),
            format_secs(region.end_secs),
            region.color,
            region.resizable,
            region.draggable,
        );
    }
    out
}

/// Legend list items: one color swatch + label per entry.
pub fn legend_items(legend: &[LegendEntry]) -> String {
    let mut out = String::new();
    for entry in legend {
        let _ = write!(
            out,
            "<li><span style='background-color:{}'></span>{}</li>",
            entry.color,
            escape_html(&entry.label),
        );
    }
    out
}

/// Substitute the data URI and region statements into the widget template.
pub fn render_template(template: &str, data_uri: &str, regions: &[Region]) -> String {
    template
        .replace(BASE64_TOKEN, data_uri)
        .replace(REGIONS_TOKEN, &region_statements(regions))
}

/// Seconds as a general-purpose decimal: `0`, `1`, `2.53` — no trailing
/// zeros, no exponent at timeline magnitudes.
fn format_secs(secs: f64) -> String {
    format!("{secs}")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{map_spans, LabelColorMap};
    use crate::vad::SpeechSpan;

    fn regions_for(spans: &[SpeechSpan]) -> Vec<Region> {
        let mut colors = LabelColorMap::new();
        map_spans(spans, 16_000, &mut colors).0
    }

    #[test]
    fn region_statement_matches_widget_call_shape() {
        let statements = region_statements(&regions_for(&[SpeechSpan::new(0, 16_000)]));
        assert_eq!(
            statements,
            "var re = wavesurfer.addRegion({start: 0, end: 1, color: '#ffd70033', \
             resize : false, drag : false});"
        );
    }

    #[test]
    fn fractional_seconds_print_as_plain_decimals() {
        let statements = region_statements(&regions_for(&[SpeechSpan::new(8_000, 40_500)]));
        assert!(statements.contains("start: 0.5"), "{statements}");
        assert!(statements.contains("end: 2.53125"), "{statements}");
    }

    #[test]
    fn statements_concatenate_in_span_order() {
        let statements = region_statements(&regions_for(&[
            SpeechSpan::new(0, 16_000),
            SpeechSpan::new(32_000, 48_000),
        ]));
        let first = statements.find("start: 0,").unwrap();
        let second = statements.find("start: 2,").unwrap();
        assert!(first < second);
    }

    #[test]
    fn legend_items_render_swatch_and_label() {
        let items = legend_items(&[LegendEntry {
            label: "SPEECH".into(),
            color: "#ffd70033".into(),
        }]);
        assert_eq!(
            items,
            "<li><span style='background-color:#ffd70033'></span>SPEECH</li>"
        );
    }

    #[test]
    fn legend_labels_are_html_escaped() {
        let items = legend_items(&[LegendEntry {
            label: "<b>&x".into(),
            color: "#00ffff33".into(),
        }]);
        assert!(items.contains("&lt;b&gt;&amp;x"), "{items}");
    }

    #[test]
    fn template_tokens_are_substituted() {
        let template = "<audio src=\"BASE64\"></audio><script>REGIONS</script>";
        let html = render_template(
            template,
            "data:audio/x-wav;base64,AAAA",
            &regions_for(&[SpeechSpan::new(0, 16_000)]),
        );
        assert!(html.contains("src=\"data:audio/x-wav;base64,AAAA\""));
        assert!(html.contains("wavesurfer.addRegion"));
        assert!(!html.contains("REGIONS"));
    }
}
