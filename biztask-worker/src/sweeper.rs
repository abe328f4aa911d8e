/// Retention sweeper
///
/// Periodically deletes completed tasks that finished more than the retention
/// window ago, company by company.
///
/// # Architecture
///
/// ```text
/// RetentionSweeper
///   ├─> Gateway::company_ids: every company with data
///   └─> cleanup_tasks_older_than: per company, errors logged and skipped
/// ```
///
/// # Example
///
/// ```no_run
/// use biztask_worker::sweeper::{RetentionSweeper, SweeperConfig};
/// use biztask_shared::gateway::memory::MemoryGateway;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let sweeper = RetentionSweeper::new(Arc::new(MemoryGateway::new()), SweeperConfig::default());
/// let shutdown = sweeper.shutdown_token();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
/// sweeper.run().await?;
/// # Ok(())
/// # }
/// ```

use biztask_shared::gateway::{cleanup_tasks_older_than, Gateway, StoreError, RETENTION_DAYS};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::env;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Longest accepted retention window (about a century)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Sweeper configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,

    /// Completed tasks older than this are deleted
    pub retention_days: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            interval_secs: 6 * 60 * 60,
            retention_days: RETENTION_DAYS,
        }
    }
}

impl SweeperConfig {
    /// Reads `SWEEP_INTERVAL_SECS` and `RETENTION_DAYS`, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(v) => v.parse::<u64>()?,
            Err(_) => defaults.interval_secs,
        };
        let retention_days = match env::var("RETENTION_DAYS") {
            Ok(v) => v.parse::<i64>()?,
            Err(_) => defaults.retention_days,
        };

        Self {
            interval_secs,
            retention_days,
        }
        .validate()
    }

    /// Rejects a zero interval and retention outside `1..=MAX_RETENTION_DAYS`
    pub fn validate(self) -> anyhow::Result<Self> {
        if self.interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be positive");
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            anyhow::bail!("RETENTION_DAYS must be between 1 and {}", MAX_RETENTION_DAYS);
        }
        Ok(self)
    }
}

/// Totals of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub companies: usize,
    pub deleted: usize,
    /// Companies whose cleanup failed
    pub failed: usize,
}

pub struct RetentionSweeper {
    gateway: Arc<dyn Gateway>,
    config: SweeperConfig,
    shutdown_token: CancellationToken,
}

impl RetentionSweeper {
    pub fn new(gateway: Arc<dyn Gateway>, config: SweeperConfig) -> Self {
        RetentionSweeper {
            gateway,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Sweeps every company once
    ///
    /// A failing company does not stop the sweep; only listing the companies
    /// is fatal. Retention is clamped to `1..=MAX_RETENTION_DAYS`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let retention =
            ChronoDuration::days(self.config.retention_days.clamp(1, MAX_RETENTION_DAYS));
        let companies = self.gateway.company_ids().await?;

        let mut report = SweepReport {
            companies: companies.len(),
            ..Default::default()
        };

        for company_id in companies {
            match cleanup_tasks_older_than(self.gateway.as_ref(), company_id, now, retention).await {
                Ok(deleted) => report.deleted += deleted,
                Err(e) => {
                    tracing::error!(%company_id, error = %e, "Retention sweep failed for company");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweeps immediately, then every `interval_secs` until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            retention_days = self.config.retention_days,
            "Retention sweeper starting"
        );

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Retention sweeper shut down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(report) => tracing::info!(
                            companies = report.companies,
                            deleted = report.deleted,
                            failed = report.failed,
                            "Retention sweep finished"
                        ),
                        Err(e) => tracing::error!(error = %e, "Failed to list companies"),
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biztask_shared::gateway::memory::MemoryGateway;
    use biztask_shared::lifecycle::{self, TaskDraft};
    use biztask_shared::models::task::TaskStatus;
    use biztask_shared::models::user::User;

    async fn seed(gateway: &MemoryGateway, company: &str, finished_days_ago: &[i64]) -> User {
        let boss = User::founder(company, "Sếp", "sep", "hash".to_string());
        gateway.register_company(&boss).await.unwrap();

        let now = Utc::now();
        for days in finished_days_ago {
            let mut task = lifecycle::new_task(
                TaskDraft {
                    title: format!("Việc {} ngày trước", days),
                    due_date: Some(now - ChronoDuration::days(days + 1)),
                    ..Default::default()
                },
                &boss,
                now - ChronoDuration::days(days + 5),
            )
            .unwrap();
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now - ChronoDuration::days(*days));
            gateway.add_task(&task).await.unwrap();
        }
        boss
    }

    #[test]
    fn test_default_config() {
        let config = SweeperConfig::default();
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.interval_secs, 21_600);
    }

    #[test]
    fn test_retention_bounds() {
        let config = |retention_days| SweeperConfig {
            interval_secs: 60,
            retention_days,
        };

        assert!(config(1).validate().is_ok());
        assert!(config(MAX_RETENTION_DAYS).validate().is_ok());
        assert!(config(0).validate().is_err());
        assert!(config(MAX_RETENTION_DAYS + 1).validate().is_err());
        assert!(config(i64::MAX).validate().is_err());
        assert!(SweeperConfig {
            interval_secs: 0,
            retention_days: 30,
        }
        .validate()
        .is_err());
    }

    #[tokio::test]
    async fn test_huge_retention_keeps_everything() {
        let gateway = Arc::new(MemoryGateway::new());
        seed(&gateway, "Công ty ABC", &[400, 20]).await;

        let sweeper = RetentionSweeper::new(
            gateway,
            SweeperConfig {
                interval_secs: 60,
                retention_days: i64::MAX,
            },
        );
        let report = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_sweep_covers_every_company() {
        let gateway = Arc::new(MemoryGateway::new());
        let abc = seed(&gateway, "Công ty ABC", &[120, 91, 10]).await;
        let xyz = seed(&gateway, "Công ty XYZ", &[200]).await;

        let sweeper = RetentionSweeper::new(gateway.clone(), SweeperConfig::default());
        let report = sweeper.sweep_once(Utc::now()).await.unwrap();

        assert_eq!(report.companies, 2);
        assert_eq!(report.deleted, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(gateway.list_tasks(abc.company_id).await.unwrap().len(), 1);
        assert!(gateway.list_tasks(xyz.company_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_retention() {
        let gateway = Arc::new(MemoryGateway::new());
        seed(&gateway, "Công ty ABC", &[40, 20]).await;

        let sweeper = RetentionSweeper::new(
            gateway,
            SweeperConfig {
                interval_secs: 60,
                retention_days: 30,
            },
        );
        assert_eq!(sweeper.sweep_once(Utc::now()).await.unwrap().deleted, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let gateway = Arc::new(MemoryGateway::new());
        seed(&gateway, "Công ty ABC", &[100]).await;

        let sweeper = RetentionSweeper::new(gateway.clone(), SweeperConfig::default());
        let token = sweeper.shutdown_token();

        let handle = tokio::spawn(async move { sweeper.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        handle.await.unwrap().unwrap();
        let abc = gateway.company_ids().await.unwrap()[0];
        assert!(gateway.list_tasks(abc).await.unwrap().is_empty());
    }
}
