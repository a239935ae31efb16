use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use appointment_cell::services::reminders::ReminderScanService;
use notification_cell::services::dispatch::NotificationDispatchService;
use shared_config::AppConfig;

/// Drives the notification dispatcher and the reminder scanner on a
/// fixed interval for the lifetime of the process.
pub struct BackgroundScheduler {
    config: Arc<AppConfig>,
    dispatch: NotificationDispatchService,
    reminders: ReminderScanService,
}

impl BackgroundScheduler {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            dispatch: NotificationDispatchService::new(&config),
            reminders: ReminderScanService::new(&config),
            config,
        }
    }

    /// Runs until the shutdown signal flips. Errors inside a tick are
    /// logged; the loop itself only exits on shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Background scheduler starting (tick every {}s)",
            self.config.scheduler_tick_seconds
        );

        let mut ticker = interval(Duration::from_secs(self.config.scheduler_tick_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Background scheduler stopping");
    }

    async fn tick(&self) {
        let token = self.config.service_token();

        // Dispatch first so notifications queued by the previous scan go
        // out before new ones pile up.
        match self.dispatch.dispatch(token).await {
            Ok(summary) if summary.processed > 0 => {
                info!(
                    "Notification dispatch: {} processed, {} sent, {} failed",
                    summary.processed, summary.sent, summary.failed
                );
            }
            Ok(_) => {}
            Err(e) => error!("Error processing pending notifications: {}", e),
        }

        if let Err(e) = self.reminders.scan(token).await {
            error!("Error scanning for appointment reminders: {}", e);
        }
    }
}
