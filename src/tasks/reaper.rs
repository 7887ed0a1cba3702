//! Idle Session Reaper
//!
//! Background task that periodically ends sessions nobody has used for a
//! while, releasing their session tiers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::DataService;

/// Spawns a background task that ends idle sessions every `interval`.
///
/// Idleness is judged against the service's configured session idle timeout.
/// The returned handle is aborted during graceful shutdown.
pub fn spawn_reaper_task(service: DataService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, idle_timeout = ?service.config().session_idle_timeout, "session reaper started");

        loop {
            tokio::time::sleep(interval).await;

            let reaped = service.reap_idle_sessions().await;
            if reaped.is_empty() {
                debug!("session reaper: no idle sessions");
            } else {
                info!(count = reaped.len(), sessions = ?reaped, "session reaper: ended idle sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fetch::SyntheticProvider;
    use crate::models::DataRequest;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn service(idle_secs: u64) -> DataService {
        let config = Config {
            session_idle_timeout: Duration::from_secs(idle_secs),
            ..Config::default()
        };
        DataService::new(config, Arc::new(SyntheticProvider::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_ends_idle_sessions() {
        let service = service(10);
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        service
            .session("idle")
            .await
            .get_data(&DataRequest::daily_bar("600519.SH", day, day))
            .await
            .unwrap();

        let handle = spawn_reaper_task(service.clone(), Duration::from_secs(5));

        // Keep "busy" in use while "idle" ages out
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(4)).await;
            service.session("busy").await;
        }

        assert!(service.existing_session("idle").await.is_none());
        assert!(service.existing_session("busy").await.is_some());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_keeps_active_sessions() {
        let service = service(60);
        service.session("s1").await;

        let handle = spawn_reaper_task(service.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(service.session_count().await, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_reaper_can_be_aborted() {
        let handle = spawn_reaper_task(service(60), Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
