use crate::audio::CaptureConfig;
use crate::catalog::SceneCatalog;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared state for the practice backend
#[derive(Clone)]
pub struct AppState {
    /// Scenes served at /api/scenes
    pub catalog: Arc<SceneCatalog>,
    /// Payload served at /api/config
    pub app_config: Arc<Value>,
    /// Open WebSocket connections
    connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(catalog: SceneCatalog, audio: &CaptureConfig) -> Self {
        let app_config = json!({
            "audio_settings": {
                "sampleRate": audio.sample_rate,
                "channelCount": audio.channels,
                "echoCancellation": audio.echo_cancellation,
                "noiseSuppression": audio.noise_suppression,
            },
            "supported_languages": ["ja", "en"],
        });

        Self {
            catalog: Arc::new(catalog),
            app_config: Arc::new(app_config),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SceneCatalog::builtin(), &CaptureConfig::default())
    }
}
