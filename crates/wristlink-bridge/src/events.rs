//! Lifecycle hooks and the bridge that owns in-flight pipeline runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use wristlink_core::{Config, PlatformVariant};
use wristlink_device::{timezone_offset_minutes, DeliveryError, DeviceChannel, WeatherMessage};
use wristlink_weather::{LocationProvider, PositionOptions, WeatherError, WeatherProvider};

use crate::error::RunError;
use crate::pipeline::{run_pipeline, PipelineContext};

/// Resolves to `None` when the run was cancelled by [`Bridge::shutdown`]
pub type RunHandle = JoinHandle<Option<Result<WeatherMessage, RunError>>>;

/// Events delivered by the host
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// The bridge has initialized; fired once
    Ready,
    /// The watch sent a message. Its contents are not inspected; any inbound
    /// message means "refresh the weather".
    AppMessage(serde_json::Value),
}

/// What started a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Ready,
    Refresh,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Ready => f.write_str("ready"),
            Trigger::Refresh => f.write_str("refresh"),
        }
    }
}

/// Tasks started by the ready event
pub struct ReadyHandles {
    pub run: RunHandle,
    /// Only present on platforms that get the timezone pushed
    pub timezone: Option<JoinHandle<Option<Result<i32, DeliveryError>>>>,
}

/// Wires host events to pipeline runs.
///
/// Runs never wait on each other: overlapping triggers each get their own
/// task and may finish in any order.
pub struct Bridge<L, C> {
    ctx: Arc<PipelineContext<L, C>>,
    platform: PlatformVariant,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    /// Held for the whole close/wait/reopen cycle of `drain` and `shutdown`
    drain_lock: Mutex<()>,
    next_run: AtomicU64,
}

impl<L, C> Bridge<L, C>
where
    L: LocationProvider + 'static,
    C: DeviceChannel + 'static,
{
    pub fn new(ctx: PipelineContext<L, C>, platform: PlatformVariant) -> Self {
        Self {
            ctx: Arc::new(ctx),
            platform,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            drain_lock: Mutex::new(()),
            next_run: AtomicU64::new(1),
        }
    }

    /// Build a bridge from configuration and the host's location service and watch channel.
    pub fn from_config(config: &Config, location: L, channel: C) -> Result<Self, WeatherError> {
        let ctx = PipelineContext {
            location,
            weather: WeatherProvider::from_config(&config.weather)?,
            channel,
            options: PositionOptions::from(&config.location),
        };
        Ok(Self::new(ctx, config.device.platform))
    }

    pub fn context(&self) -> &PipelineContext<L, C> {
        &self.ctx
    }

    pub fn platform(&self) -> PlatformVariant {
        self.platform
    }

    /// Dispatch a host event, returning the pipeline run it started.
    pub fn handle_event(&self, event: BridgeEvent) -> RunHandle {
        match event {
            BridgeEvent::Ready => self.on_ready().run,
            BridgeEvent::AppMessage(payload) => self.on_app_message(payload),
        }
    }

    pub fn on_ready(&self) -> ReadyHandles {
        tracing::info!("Bridge ready! (platform: {})", self.platform);

        let run = self.spawn_run(Trigger::Ready);
        let timezone = self
            .platform
            .pushes_timezone()
            .then(|| self.push_timezone());

        ReadyHandles { run, timezone }
    }

    pub fn on_app_message(&self, payload: serde_json::Value) -> RunHandle {
        tracing::info!("AppMessage received!");
        tracing::debug!("AppMessage payload: {}", payload);
        self.spawn_run(Trigger::Refresh)
    }

    /// Start an independent pipeline run.
    pub fn spawn_run(&self, trigger: Trigger) -> RunHandle {
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let ctx = self.ctx.clone();
        let cancelled = self.shutdown.clone();
        let span = tracing::info_span!("pipeline", run = run_id, %trigger);

        self.tracker.spawn(
            async move {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        tracing::debug!("Pipeline run cancelled");
                        None
                    }
                    result = run_pipeline(&*ctx) => {
                        if let Err(e) = &result {
                            tracing::warn!("Pipeline run failed: {}", e.user_message());
                        }
                        Some(result)
                    }
                }
            }
            .instrument(span),
        )
    }

    fn push_timezone(&self) -> JoinHandle<Option<Result<i32, DeliveryError>>> {
        let now = Local::now();
        let offset = timezone_offset_minutes(&now);
        let ctx = self.ctx.clone();
        let cancelled = self.shutdown.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => None,
                result = ctx.channel.send_timezone_offset(offset) => {
                    match &result {
                        Ok(()) => tracing::info!("timezone = {} offset = {}", now, offset),
                        Err(e) => tracing::error!("Error sending timezone offset: {}", e),
                    }
                    Some(result.map(|()| offset))
                }
            }
        })
    }

    /// Number of runs and pushes still in flight
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every in-flight task to finish without cancelling anything.
    ///
    /// Concurrent drains take turns. After [`Bridge::shutdown`] the tracker
    /// stays closed.
    pub async fn drain(&self) {
        let _guard = self.drain_lock.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        if !self.shutdown.is_cancelled() {
            self.tracker.reopen();
        }
    }

    /// Cancel pending runs and wait for their tasks to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down bridge ({} tasks in flight)", self.tracker.len());
        // Cancel before taking the lock so a drain in progress finishes promptly
        self.shutdown.cancel();
        let _guard = self.drain_lock.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
    }
}
