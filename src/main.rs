use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use roundscan::fingerprint::{match_profile, MatchConfig, MatchMode, ReferenceSet, SignalProfile};
use roundscan::notify::{CompletionNotifier, ConsoleNotifier, LogNotifier};
use roundscan::sensing::{IwScanSource, SampleSource, SimulatedSource};
use roundscan::settings::{SamplerSettings, SettingsStore};
use roundscan::{RunOutcome, Scheduler};

mod cli;

use cli::{Cli, Command, MatchArgs, ScanArgs};

#[tokio::main]
async fn main() -> Result<()> {
    roundscan::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Scan(args) => scan(args).await,
        Command::Match(args) => run_match(args),
    }
}

async fn scan(args: ScanArgs) -> Result<()> {
    let store = args
        .settings
        .clone()
        .map(SettingsStore::new)
        .transpose()?;
    let base = match &store {
        Some(store) => store.sampler()?,
        None => SamplerSettings::default(),
    };

    let settings = SamplerSettings {
        total_rounds: args.rounds.unwrap_or(base.total_rounds),
        interval_secs: args.interval.unwrap_or(base.interval_secs),
        output_dir: args.output.clone().unwrap_or(base.output_dir),
        poll_timeout_secs: args.poll_timeout.unwrap_or(base.poll_timeout_secs),
    };

    if args.save {
        if let Some(store) = &store {
            store.update_sampler(settings.clone())?;
        }
    }

    let source: Arc<dyn SampleSource> = if args.simulate {
        info!("Using simulated access points");
        Arc::new(SimulatedSource::demo())
    } else {
        let iw = IwScanSource::new(args.iface.clone());
        info!("Scanning with iw on {}", iw.interface());
        Arc::new(iw)
    };

    // plain log output when stdout is piped or redirected
    let notifier: Arc<dyn CompletionNotifier> = if std::io::stdout().is_terminal() {
        Arc::new(ConsoleNotifier)
    } else {
        Arc::new(LogNotifier)
    };

    let scheduler = Scheduler::new(source, notifier);
    let run_id = scheduler
        .start(settings.to_run_config())
        .await
        .context("Failed to start sampling run")?;

    let canceller = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run {run_id}");
            canceller.cancel().await;
        }
    });

    match scheduler.wait().await.context("Sampling run failed")? {
        RunOutcome::Completed(_) => Ok(()),
        RunOutcome::Cancelled {
            rounds_completed, ..
        } => {
            println!("Scan cancelled after {rounds_completed} rounds; nothing was written");
            Ok(())
        }
    }
}

fn run_match(args: MatchArgs) -> Result<()> {
    if !args.max_distance.is_finite() || args.max_distance <= 0.0 {
        bail!("--max-distance must be a positive number");
    }

    let target = SignalProfile::from_table_file(&args.target)?;
    if target.is_empty() {
        bail!("{} holds no readings", args.target.display());
    }

    let mode = if args.per_file {
        MatchMode::PerFile
    } else {
        MatchMode::PerFolder
    };
    let mut references = ReferenceSet::load(&args.references, mode)?;
    if mode == MatchMode::PerFile {
        references.exclude(&args.target);
    }
    if references.is_empty() {
        bail!("No reference tables found");
    }

    let config = MatchConfig {
        missing_level: args.missing_level,
        max_distance: args.max_distance,
    };
    let report = match_profile(&target, &references, &config);

    for scored in &report.distances {
        println!("{}: {:.2}", scored.name, scored.distance);
    }
    match report.closest {
        Some(best) => println!("Closest place: {} ({:.2})", best.name, best.distance),
        None => println!("Closest place: No Place"),
    }
    Ok(())
}
