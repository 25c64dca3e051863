//! Command handlers.

use super::{Cli, Commands};
use anyhow::{Context, Result};
use reelwright::{
    ExitStatus, ProductionRecord, ProductionRequestBuilder, RecordId, Reelwright, ReelwrightConfig,
    ReelwrightError, TopicSelection, init_logging,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value).context("Failed to encode output")?);
    Ok(())
}

fn report(record: &ProductionRecord) -> Result<ExitStatus> {
    print_json(record)?;
    let status = ExitStatus::for_record(record);
    info!(id = %record.id(), state = %record.state(), status = %status, "Production finished");
    Ok(status)
}

/// Cancel `token` on Ctrl-C. In-flight stages finish; the next stage boundary stops.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping at the next stage boundary");
            token.cancel();
        }
    });
}

/// Execute a parsed command.
pub async fn run(cli: Cli) -> Result<ExitStatus> {
    let config = ReelwrightConfig::load(cli.config.as_deref())?;
    init_logging(config.logging()).map_err(ReelwrightError::from)?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let app = Reelwright::open(config).await?;

    match cli.command {
        Commands::Produce {
            topic,
            theme,
            no_upload,
            dry_run,
        } => {
            let request = ProductionRequestBuilder::default()
                .topic(topic.parse::<TopicSelection>().map_err(ReelwrightError::from)?)
                .theme(theme)
                .upload_enabled(!(no_upload || dry_run))
                .build()
                .context("Failed to build production request")?;
            let record = app.produce(&request, &cancel).await?;
            report(&record)
        }

        Commands::Schedule { count, periodic } => {
            let count = count.unwrap_or(*app.config().scheduler().batch_size());
            if periodic {
                app.run_periodic(count, &cancel).await?;
                return Ok(ExitStatus::Success);
            }
            let batch = app.run_batch(count, &cancel).await?;
            for record in batch.records() {
                print_json(record)?;
            }
            if let Some(reason) = batch.stopped() {
                info!(reason = %reason, "Batch stopped early");
            }
            Ok(ExitStatus::for_batch(&batch))
        }

        Commands::Resume { id } => {
            let id = id.parse::<RecordId>().map_err(ReelwrightError::from)?;
            let record = app.resume(&id, &cancel).await?;
            report(&record)
        }

        Commands::Publish { id } => {
            let id = id.parse::<RecordId>().map_err(ReelwrightError::from)?;
            let record = app.publish(&id, &cancel).await?;
            report(&record)
        }

        Commands::History { limit } => {
            for record in app.history(limit).await? {
                print_json(&record)?;
            }
            Ok(ExitStatus::Success)
        }

        Commands::Quota => {
            for row in app.quota_report().await {
                print_json(&row)?;
            }
            Ok(ExitStatus::Success)
        }

        Commands::Trends { list } => {
            if list {
                for idea in app.queued_ideas().await? {
                    print_json(&idea)?;
                }
                return Ok(ExitStatus::Success);
            }
            let report = app.refresh_trends().await?;
            print_json(&report)?;
            if !report.live() {
                warn!("Trend refresh ran on fallback topics");
            }
            Ok(ExitStatus::Success)
        }
    }
}
