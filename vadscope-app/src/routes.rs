//! Upload page and analysis handlers.
//!
//! `POST /analyze` is the whole demo: read the uploaded bytes, decode and
//! segment them on a blocking thread, and answer with the rendered result
//! page. Decode failures come back as a user-visible error banner; nothing
//! about a failed request survives it.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tracing::{info, warn};
use vadscope_core::render::markup;
use vadscope_core::{encode_data_uri, map_spans, LabelColorMap, LegendEntry, Region, SpeechSpan};

use crate::state::AppState;

const INDEX_PAGE: &str = include_str!("../assets/index.html");
const WIDGET_TEMPLATE: &str = include_str!("../assets/template.html");
const STYLE: &str = include_str!("../assets/style.css");

/// Multipart bodies are capped slightly above the loader's own byte limit so
/// the loader's friendlier message is the one users usually see.
const BODY_LIMIT_BYTES: usize = 96 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/api/analyze", post(analyze_json))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn health() -> &'static str {
    "OK"
}

/// The analysis result, for programmatic consumers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReport {
    duration_secs: f64,
    sample_rate: u32,
    spans: Vec<SpeechSpan>,
    regions: Vec<Region>,
    legend: Vec<LegendEntry>,
}

struct Analysis {
    report: AnalysisReport,
    data_uri: String,
}

async fn analyze(State(state): State<AppState>, multipart: Multipart) -> Response {
    match run_analysis(state, multipart).await {
        Ok(analysis) => Html(result_page(&analysis)).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn analyze_json(State(state): State<AppState>, multipart: Multipart) -> Response {
    match run_analysis(state, multipart).await {
        Ok(analysis) => Json(analysis.report).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// What a failed request turns into: a status plus a message safe to show.
struct Rejection {
    status: StatusCode,
    message: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, Html(error_page(&self.message))).into_response()
    }
}

async fn run_analysis(
    state: AppState,
    mut multipart: Multipart,
) -> Result<Analysis, Rejection> {
    let bytes = read_upload(&mut multipart).await?;

    // Decoding and inference are blocking, CPU-bound work; keep them off the
    // async executor.
    let outcome = tokio::task::spawn_blocking(move || analyze_bytes(&state, &bytes)).await;

    match outcome {
        Ok(Ok(analysis)) => Ok(analysis),
        Ok(Err(e)) if e.is_user_input() => {
            info!("rejected upload: {e}");
            Err(Rejection {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: e.to_string(),
            })
        }
        Ok(Err(e)) => {
            warn!("analysis failed: {e}");
            Err(Rejection {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "analysis failed; please try again".into(),
            })
        }
        Err(e) => {
            warn!("analysis task panicked: {e}");
            Err(Rejection {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "analysis failed; please try again".into(),
            })
        }
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, Rejection> {
    let bad_request = |message: &str| Rejection {
        status: StatusCode::BAD_REQUEST,
        message: message.to_string(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("malformed upload: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(&format!("upload interrupted: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(bad_request("no file in the upload form"))
}

fn analyze_bytes(state: &AppState, bytes: &[u8]) -> vadscope_core::error::Result<Analysis> {
    // Cheap rejection path first: bad or oversized uploads never reach the
    // detector.
    let source = state.loader.probe(bytes)?;
    info!(
        source_rate = source.sample_rate,
        channels = source.channels,
        duration = ?source.duration_secs,
        "upload probed"
    );

    let waveform = state.loader.load(bytes)?;
    let spans = state.detector.segment(&waveform)?;
    info!(spans = spans.len(), "speech detection finished");

    let mut colors = LabelColorMap::new();
    let (regions, legend) = map_spans(&spans, waveform.sample_rate, &mut colors);
    let data_uri = encode_data_uri(&waveform)?;

    Ok(Analysis {
        report: AnalysisReport {
            duration_secs: waveform.duration_secs(),
            sample_rate: waveform.sample_rate,
            spans,
            regions,
            legend,
        },
        data_uri,
    })
}

fn result_page(analysis: &Analysis) -> String {
    let widget = markup::render_template(
        WIDGET_TEMPLATE,
        &analysis.data_uri,
        &analysis.report.regions,
    );
    let legend = markup::legend_items(&analysis.report.legend);

    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Voice activity detection</title><style>{STYLE}</style></head><body>\
         <h3>Voice activity detection</h3>\
         <section class=\"widget\">{widget}</section>\
         <div style='overflow : auto'><ul class='legend'>{legend}</ul></div>\
         <hr><p><a href=\"/\">Analyze another file</a></p>\
         </body></html>"
    )
}

fn error_page(message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Voice activity detection</title><style>{STYLE}</style></head><body>\
         <h3>Voice activity detection</h3>\
         <p class=\"error\">{}</p>\
         <p><a href=\"/\">Back</a></p>\
         </body></html>",
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_escapes_the_message() {
        let html = error_page("bad <tag> & more");
        assert!(html.contains("bad &lt;tag&gt; &amp; more"));
        assert!(!html.contains("<tag>"));
    }

    #[test]
    fn widget_template_carries_both_tokens() {
        assert!(WIDGET_TEMPLATE.contains(markup::BASE64_TOKEN));
        assert!(WIDGET_TEMPLATE.contains(markup::REGIONS_TOKEN));
    }

    #[test]
    fn analysis_report_serializes_with_camel_case() {
        let mut colors = LabelColorMap::new();
        let spans = vec![SpeechSpan::new(0, 16_000)];
        let (regions, legend) = map_spans(&spans, 16_000, &mut colors);

        let report = AnalysisReport {
            duration_secs: 2.0,
            sample_rate: 16_000,
            spans,
            regions,
            legend,
        };

        let json = serde_json::to_value(&report).expect("serialize report");
        assert_eq!(json["durationSecs"], 2.0);
        assert_eq!(json["sampleRate"], 16_000);
        assert_eq!(json["spans"][0]["end"], 16_000);
        assert_eq!(json["regions"][0]["label"], "SPEECH");
        assert_eq!(json["legend"][0]["color"], "#ffd70033");
    }
}
