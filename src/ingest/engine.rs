use crate::ingest::{Ingestor, IngestorState};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Main ingestion loop.
/// Fires a cycle every `interval` while the ingestor is running and idles
/// while it is stopped. Each cycle runs on its own task; a tick that lands
/// while the previous cycle is still going is skipped by the ingestor.
pub async fn run_ingest_loop(ingestor: Ingestor) {
    info!(interval_ms = ingestor.interval().as_millis() as u64, "Ingest engine started");

    let mut state_rx = ingestor.subscribe();
    let mut interval = tokio::time::interval(ingestor.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let state = *state_rx.borrow_and_update();
        if state == IngestorState::Stopped {
            debug!("Ingestion paused");
            if state_rx.changed().await.is_err() {
                break;
            }
            // Resume one full period after the toggle.
            interval.reset();
            continue;
        }

        tokio::select! {
            _ = interval.tick() => {
                // A stop may have landed between the tick and now.
                if ingestor.state() != IngestorState::Running {
                    continue;
                }
                let ingestor = ingestor.clone();
                tokio::spawn(async move {
                    let report = ingestor.run_cycle().await;
                    if report.skipped {
                        return;
                    }
                    if report.failed > 0 {
                        warn!(failed = report.failed, "Cycle finished with rejected samples");
                    }
                    if report.alerts_created > 0 {
                        info!(alerts = report.alerts_created, "Cycle raised alerts");
                    }
                });
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Ingest engine stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Actor;
    use crate::config::IngestConfig;
    use crate::detect::rules::{compile_rules, default_rules};
    use crate::detect::ScoringConfig;
    use crate::ingest::{IngestSettings, Pipeline};
    use crate::store::FleetStore;
    use crate::telemetry::{sample, ScriptedSource, StaticRegistry};
    use std::sync::Arc;
    use std::time::Duration;

    async fn ingestor(start_running: bool) -> Ingestor {
        let mut source = ScriptedSource::new();
        for _ in 0..200 {
            source.push(sample("V-001"));
        }
        Ingestor::new(
            FleetStore::new(&IngestConfig::default()),
            Box::new(source),
            Arc::new(StaticRegistry::new(["V-001"])),
            Pipeline {
                rules: compile_rules(&default_rules()).unwrap(),
                scoring: ScoringConfig::default(),
            },
            IngestSettings {
                interval: Duration::from_millis(20),
                start_running,
                fuel_price: 3.5,
            },
        )
        .await
    }

    async fn samples(ing: &Ingestor) -> u64 {
        ing.store()
            .current_edge_status()
            .await
            .first()
            .map_or(0, |d| d.sample_count)
    }

    #[tokio::test]
    async fn test_loop_ingests_while_running() {
        let ing = ingestor(true).await;
        let handle = tokio::spawn(run_ingest_loop(ing.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(samples(&ing).await >= 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_loop_idles_while_stopped() {
        let ing = ingestor(false).await;
        let handle = tokio::spawn(run_ingest_loop(ing.clone()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(samples(&ing).await, 0);

        ing.start(&Actor::system()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let running = samples(&ing).await;
        assert!(running >= 1);

        ing.stop(&Actor::system()).await;
        // Let any in-flight cycle drain.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let stopped_at = samples(&ing).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(samples(&ing).await, stopped_at);

        handle.abort();
    }
}
