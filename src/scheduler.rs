//! Weekly send loop. Ticks every minute and fires the full
//! generate-and-send run once per configured weekday/hour slot.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use sqlx::SqlitePool;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::config::{Config, SCHEDULE_TICK_SECS};
use crate::newsletter::NewsletterGenerator;

pub struct NewsletterScheduler {
    cfg: Config,
    pool: SqlitePool,
    /// Date of the last fired run; keeps the hour-long slot from re-firing.
    last_sent: Option<NaiveDate>,
}

impl NewsletterScheduler {
    pub fn new(cfg: Config, pool: SqlitePool) -> Self {
        Self { cfg, pool, last_sent: None }
    }

    pub async fn run(mut self) {
        info!(
            "Newsletter scheduler running: sends {:?} at {:02}:00 UTC",
            self.cfg.send_weekday, self.cfg.send_hour_utc
        );

        let mut ticker = interval(Duration::from_secs(SCHEDULE_TICK_SECS));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if !self.should_fire(now) {
                continue;
            }

            self.last_sent = Some(now.date_naive());
            info!("Send window reached; starting weekly newsletter run");

            let generator = NewsletterGenerator::new(self.cfg.clone(), self.pool.clone());
            match generator.generate_and_send_all().await {
                Ok(report) => info!(
                    "Weekly run finished: {} newsletters, {} emails",
                    report.newsletters_generated, report.total_emails_sent
                ),
                Err(e) => error!("Weekly newsletter run failed: {e}"),
            }
        }
    }

    fn should_fire(&self, now: DateTime<Utc>) -> bool {
        now.weekday() == self.cfg.send_weekday
            && now.hour() == self.cfg.send_hour_utc
            && self.last_sent != Some(now.date_naive())
    }
}
