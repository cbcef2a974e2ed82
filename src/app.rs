//! Application wiring
//!
//! `AppContext` is built once at startup and handed to `run`, which owns the
//! controller, the channel and the audio pipeline for the lifetime of the
//! client and interleaves their events on a single task.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::audio::{AudioCapturePipeline, MicrophoneSource, VolumeSample};
use crate::catalog::{self, SceneCatalog};
use crate::channel::MessageChannel;
use crate::config::Config;
use crate::session::{SessionController, SessionNotification, UserIntent};

/// Write-only consumer of core state
pub trait Presenter {
    fn notification(&mut self, notification: &SessionNotification);
    fn volume(&mut self, sample: VolumeSample);
}

/// Everything the client needs, constructed once
pub struct AppContext {
    pub config: Config,
    pub catalog: SceneCatalog,
    pub source: Arc<dyn MicrophoneSource>,
}

impl AppContext {
    pub fn new(config: Config, catalog: SceneCatalog, source: Arc<dyn MicrophoneSource>) -> Self {
        Self {
            config,
            catalog,
            source,
        }
    }

    /// Load the scene catalog and log the backend's client config.
    ///
    /// A failed catalog fetch leaves the catalog empty instead of aborting.
    pub async fn bootstrap(config: Config, source: Arc<dyn MicrophoneSource>) -> Self {
        let http = reqwest::Client::new();
        let base_url = config.server.base_url.clone();

        let catalog = match SceneCatalog::fetch(&http, &base_url).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Failed to load scenes: {}", e);
                SceneCatalog::default()
            }
        };

        match catalog::fetch_app_config(&http, &base_url).await {
            Ok(app_config) => info!("App config loaded: {}", app_config),
            Err(e) => warn!("Failed to load app config: {}", e),
        }

        Self::new(config, catalog, source)
    }
}

/// Run the client until the intent stream ends
pub async fn run<P: Presenter>(
    ctx: &AppContext,
    mut intents: mpsc::Receiver<UserIntent>,
    presenter: &mut P,
) -> Result<()> {
    let endpoint =
        MessageChannel::endpoint_url(&ctx.config.server.base_url, &ctx.config.server.socket_path)
            .context("Invalid server URL")?;

    let (notify_tx, mut notifications) = mpsc::unbounded_channel();
    let (volume_tx, mut volume) = mpsc::channel(16);

    let (channel, mut channel_events) = MessageChannel::connect(endpoint, ctx.config.reconnect.clone());
    let mut connection = channel.watch_state();

    let audio = AudioCapturePipeline::new(
        Arc::clone(&ctx.source),
        ctx.config.audio.clone(),
        ctx.config.monitor.clone(),
        volume_tx,
    );
    let mut controller = SessionController::new(
        ctx.catalog.clone(),
        Box::new(channel.sender()),
        audio,
        notify_tx,
    );

    loop {
        tokio::select! {
            intent = intents.recv() => match intent {
                Some(intent) => controller.apply(intent).await,
                None => break,
            },
            Some(event) = channel_events.recv() => controller.handle_channel_event(event).await,
            Ok(()) = connection.changed() => {
                let state = *connection.borrow_and_update();
                controller.handle_connection_state(state);
            }
            Some(sample) = volume.recv() => presenter.volume(sample),
            Some(notification) = notifications.recv() => presenter.notification(&notification),
        }
    }

    info!("Shutting down");
    controller.reset();
    drop(controller);

    while let Ok(notification) = notifications.try_recv() {
        presenter.notification(&notification);
    }

    channel.close().await;
    Ok(())
}
