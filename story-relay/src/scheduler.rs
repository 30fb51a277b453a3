use crate::pipeline::{IngestionPipeline, TickReport};
use crate::publisher::Publisher;
use crate::release::ReleaseQueue;
use crate::types::Record;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Result of one full tick of an instance.
#[derive(Debug, Clone)]
pub struct TickSummary {
    pub ingestion: TickReport,
    /// Record taken off the release queue this tick, if any.
    pub released: Option<Record>,
    /// Why releasing or posting failed. A record taken before the failure
    /// stays published either way.
    pub publish_error: Option<String>,
}

/// One source's complete pipeline: ingestion, release queue and publisher.
pub struct RelayInstance {
    name: String,
    pipeline: IngestionPipeline,
    release: ReleaseQueue,
    publisher: Publisher,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the tick ends, cancellation included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RelayInstance {
    pub fn new(pipeline: IngestionPipeline, release: ReleaseQueue, publisher: Publisher) -> Self {
        Self {
            name: pipeline.source_name(),
            pipeline,
            release,
            publisher,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Ingest, then release and publish at most one record. Returns `None`
    /// without doing anything when a tick of this instance is already running.
    pub async fn run_tick(&self) -> Option<TickSummary> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("{}: previous tick still running, skipping this one", self.name);
            return None;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let ingestion = self.pipeline.run_tick().await;

        let (released, publish_error) = match self.release.take_next_unpublished().await {
            Ok(Some(record)) => {
                let error = match self.publisher.publish(&record).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!(
                            "{}: publishing record {} failed, it stays marked published: {}",
                            self.name, record.external_id, e
                        );
                        Some(e.to_string())
                    }
                };
                (Some(record), error)
            }
            Ok(None) => {
                info!("{}: nothing to publish", self.name);
                (None, None)
            }
            Err(e) => {
                error!("{}: release failed: {}", self.name, e);
                (None, Some(e.to_string()))
            }
        };

        Some(TickSummary {
            ingestion,
            released,
            publish_error,
        })
    }
}

/// Drives every instance on a fixed interval, first tick immediately.
/// Instances run independently of each other.
pub struct Scheduler {
    interval: Duration,
    instances: Vec<Arc<RelayInstance>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            instances: Vec::new(),
        }
    }

    pub fn add_instance(&mut self, instance: RelayInstance) {
        info!("Adding relay instance: {}", instance.name());
        self.instances.push(Arc::new(instance));
    }

    /// One tick of every instance, concurrently.
    pub async fn run_once(&self) -> Vec<(String, Option<TickSummary>)> {
        let ticks = self.instances.iter().map(|instance| async move {
            (instance.name().to_string(), instance.run_tick().await)
        });
        futures::future::join_all(ticks).await
    }

    /// Names of instances with a tick currently running.
    pub fn in_flight(&self) -> Vec<String> {
        self.instances
            .iter()
            .filter(|instance| instance.is_in_flight())
            .map(|instance| instance.name().to_string())
            .collect()
    }

    /// Tick forever. Only returns if every instance task has stopped.
    /// Dropping the future aborts the instance tasks.
    pub async fn run(&self) {
        info!(
            "Starting scheduler with {} instances, interval {:?}",
            self.instances.len(),
            self.interval
        );

        let mut tasks = JoinSet::new();
        for instance in &self.instances {
            tasks.spawn(run_instance(instance.clone(), self.interval));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Relay task stopped unexpectedly: {}", e);
            }
        }
    }
}

async fn run_instance(instance: Arc<RelayInstance>, period: Duration) {
    let mut ticker = time::interval(period);
    // A tick that overruns the period swallows the missed firings.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        instance.run_tick().await;
    }
}
