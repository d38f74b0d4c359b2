//! Expired Workflow Purger
//!
//! Expiry is evaluated when a link is read, so lapsed invitations stay
//! `PENDING` in storage. This optional task deletes them once they are past a
//! retention window; inside the window they still resolve as expired.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use pc_config::PurgeConfig;

use crate::error::Result;
use super::workflow::{chrono_duration, CollaborationEngine};

pub struct ExpiryPurger {
    engine: Arc<CollaborationEngine>,
    interval: Duration,
    retention: chrono::Duration,
}

impl ExpiryPurger {
    pub fn new(engine: Arc<CollaborationEngine>, interval: Duration, retention: chrono::Duration) -> Self {
        Self {
            engine,
            interval,
            retention,
        }
    }

    pub fn from_config(engine: Arc<CollaborationEngine>, config: &PurgeConfig) -> Result<Self> {
        let retention = chrono_duration("purge retention", config.retention())?;
        Ok(Self::new(engine, config.interval(), retention))
    }

    /// Run one purge pass
    pub async fn run_once(&self) -> u64 {
        match self.engine.purge_expired(self.retention).await {
            Ok(purged) => purged,
            Err(e) => {
                error!(error = %e, "Expired workflow purge failed");
                0
            }
        }
    }

    /// Loop forever; the caller aborts the task at shutdown.
    pub async fn start(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention.num_days(),
            "Starting expired workflow purger"
        );
        loop {
            self.run_once().await;
            sleep(self.interval).await;
        }
    }
}
