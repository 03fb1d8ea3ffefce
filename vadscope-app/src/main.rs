//! Vadscope web demo entry point.
//!
//! The detector loads once here and is reused for every upload; requests do
//! their decoding and inference on blocking threads (see `routes`).

mod routes;
mod state;

use std::net::SocketAddr;

use tracing::info;
use vadscope_core::{AudioLoader, DetectorHandle, EnergySegmenter, LoaderConfig};

use state::AppState;

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vadscope=info,vadscope_core=info".parse().unwrap()),
        )
        .init();

    info!("Vadscope starting");

    let loader = AudioLoader::new(LoaderConfig::default());
    let detector = build_detector();
    let app = routes::router(AppState::new(loader, detector));

    let port = std::env::var("VADSCOPE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Pick the best available detector, once, at startup.
///
/// With the `onnx` feature the Silero model is tried first; a missing or
/// broken model file falls back to the energy segmenter rather than refusing
/// to serve.
#[cfg(feature = "onnx")]
fn build_detector() -> DetectorHandle {
    use vadscope_core::{SileroConfig, SileroSegmenter};

    let path = std::env::var("VADSCOPE_SILERO_MODEL")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| SileroSegmenter::default_model_path());

    match SileroSegmenter::new(&path, SileroConfig::default()) {
        Ok(silero) => {
            info!("using Silero VAD from {}", path.display());
            DetectorHandle::new(silero)
        }
        Err(e) => {
            tracing::warn!("Silero VAD load failed ({e}), falling back to energy VAD");
            DetectorHandle::new(EnergySegmenter::default())
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn build_detector() -> DetectorHandle {
    info!("using energy VAD (built without the onnx feature)");
    DetectorHandle::new(EnergySegmenter::default())
}
