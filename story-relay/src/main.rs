use clap::Parser;
use interfaces::RecordStore;
use story_relay::config::{self, Cli, Command};
use story_relay::{RelayInstance, Scheduler};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    if command == Command::Status {
        return status(&cli).await;
    }

    let instances = config::build_instances(&cli).await.map_err(|e| {
        error!("Failed to configure relay: {}", e);
        Box::new(e) as Box<dyn std::error::Error>
    })?;

    match command {
        Command::Tick => tick_once(instances).await,
        _ => {
            let mut scheduler = Scheduler::new(cli.relay.interval());
            for instance in instances {
                scheduler.add_instance(instance);
            }

            info!("Starting story relay");
            tokio::select! {
                _ = scheduler.run() => warn!("Scheduler stopped"),
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    for name in scheduler.in_flight() {
                        warn!("{}: tick interrupted, unfinished items are retried on the next start", name);
                    }
                }
            }
        }
    }

    info!("Story relay finished");
    Ok(())
}

async fn tick_once(instances: Vec<RelayInstance>) {
    let mut scheduler = Scheduler::new(story_relay::scheduler::DEFAULT_INTERVAL);
    for instance in instances {
        scheduler.add_instance(instance);
    }

    for (name, summary) in scheduler.run_once().await {
        let Some(summary) = summary else { continue };
        let report = &summary.ingestion;
        info!(
            "{}: {} candidates, {} new, {} already stored, {} skipped",
            name,
            report.candidates,
            report.persisted.len(),
            report.already_present,
            report.malformed
        );
        if let Some(reason) = &report.aborted {
            warn!("{}: ingestion stopped early: {}", name, reason);
        }
        match (&summary.released, &summary.publish_error) {
            (Some(record), None) => info!("{}: published {}", name, record.external_id),
            (Some(record), Some(e)) => error!("{}: lost {} after release: {}", name, record.external_id, e),
            (None, Some(e)) => error!("{}: release failed: {}", name, e),
            (None, None) => info!("{}: nothing to publish", name),
        }
    }
}

async fn status(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for (name, path) in config::store_paths(cli) {
        if !path.exists() {
            info!("{}: no store at {}", name, path.display());
            continue;
        }
        let store = RecordStore::open(&path).await?;
        let stats = store.stats().await?;
        info!(
            "{}: {} records, {} published, {} pending ({})",
            name,
            stats.total,
            stats.published,
            stats.pending,
            path.display()
        );
        for record in store.list_pending().await?.iter().take(3) {
            info!("{}:   next up #{} {} {}", name, record.id, record.external_id, record.title);
        }
        store.close().await;
    }
    Ok(())
}
