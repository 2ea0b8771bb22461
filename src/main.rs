//! # Dosewatch CLI
//!
//! Medication alarm core: durable scheduling, background dispatch, and
//! multi-device reconciliation.
//!
//! Usage:
//!   dosewatch serve                      # Run dispatcher + bridge + sync loops
//!   dosewatch add -t "Metformin" -a 2026-03-01T08:00:00Z -r daily
//!   dosewatch list                       # List alarm records
//!   dosewatch check                      # Run one dispatch tick now
//!   dosewatch sync                       # Run one reconciliation pass
//!   dosewatch config show                # Show configuration

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dosewatch_bridge::{create_bridge, reschedule_window};
use dosewatch_core::clock::{Clock, SystemClock};
use dosewatch_core::traits::{AlarmStore, ExactAlarmBridge, Presenter};
use dosewatch_core::types::{AlarmRecord, DomainEvent, Presentation, Recurrence};
use dosewatch_core::DosewatchConfig;
use dosewatch_dispatch::{create_presenter, AlarmService, Dispatcher};
use dosewatch_store::create_store;
use dosewatch_sync::{HttpRemoteStore, Reconciler};

#[derive(Parser)]
#[command(
    name = "dosewatch",
    version,
    about = "💊 Dosewatch — medication alarm core",
    long_about = "Reliable medication reminders: alarms keep firing across process \
                  suspension, and the same alarm set stays consistent across devices."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background dispatcher, exact-alarm bridge, and sync loops
    Serve,

    /// Add an alarm record
    Add {
        /// Short title shown on the notification
        #[arg(short, long)]
        title: String,

        /// Notification body
        #[arg(short, long, default_value = "")]
        message: String,

        /// Fire time, RFC 3339 (e.g. 2026-03-01T08:00:00Z)
        #[arg(short, long)]
        at: String,

        /// once | hourly | daily | weekly | monthly
        #[arg(short, long, default_value = "once")]
        recurrence: String,

        /// Free-form category (e.g. "medication")
        #[arg(long)]
        category: Option<String>,
    },

    /// List alarm records
    List,

    /// Remove an alarm record
    Remove { id: String },

    /// Run one dispatch tick now
    Check,

    /// Run one reconciliation pass
    Sync,

    /// Send a test notification through the configured presenter
    NotifyTest {
        #[arg(default_value = "Dosewatch")]
        title: String,
        #[arg(default_value = "Test notification")]
        message: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Reset to defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "dosewatch=debug,dosewatch_core=debug,dosewatch_dispatch=debug,dosewatch_sync=debug"
    } else {
        "dosewatch=info,dosewatch_dispatch=info,dosewatch_sync=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = DosewatchConfig::load()?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Add {
            title,
            message,
            at,
            recurrence,
            category,
        } => {
            let scheduled_at = chrono::DateTime::parse_from_rfc3339(&at)
                .map_err(|e| anyhow::anyhow!("Invalid --at {at:?}: {e}"))?
                .with_timezone(&chrono::Utc);
            let recurrence = Recurrence::parse(&recurrence)
                .ok_or_else(|| anyhow::anyhow!("Invalid --recurrence {recurrence:?}"))?;

            let store = create_store(&config)?;
            let mut record = AlarmRecord::new(title, message, scheduled_at, recurrence);
            record.category = category;
            let id = record.id.clone();
            store.save(record).await?;
            println!("Added alarm {id}");
            Ok(())
        }
        Commands::List => {
            let store = create_store(&config)?;
            let records = store.get_all().await?;
            if records.is_empty() {
                println!("No alarms.");
            }
            for r in records {
                println!(
                    "{}  {:<24} {}  {:<8} {}",
                    r.id,
                    r.title,
                    r.scheduled_at.to_rfc3339(),
                    r.recurrence,
                    if r.enabled { "on" } else { "off" }
                );
            }
            Ok(())
        }
        Commands::Remove { id } => {
            let store = create_store(&config)?;
            store.delete(&id).await?;
            println!("Removed alarm {id}");
            Ok(())
        }
        Commands::Check => {
            let store = create_store(&config)?;
            let presenter = create_presenter(&config)?;
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let (events_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();
            let dispatcher = Dispatcher::new(
                store,
                presenter,
                clock,
                config.dispatch.window_secs,
                events_tx,
            );
            let report = dispatcher.tick().await?;
            println!("Tick: fired {}, missed {}", report.fired, report.missed);
            Ok(())
        }
        Commands::Sync => {
            let store = create_store(&config)?;
            let remote = Arc::new(HttpRemoteStore::new(&config.sync)?);
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let reconciler = Reconciler::new(store, remote, clock, config.sync.grace_secs);
            let report = reconciler.run_once().await?;
            println!(
                "Sync: pulled {}, pushed {}, deleted {}, kept local {}",
                report.pulled, report.pushed, report.deleted, report.kept_local
            );
            Ok(())
        }
        Commands::NotifyTest { title, message } => {
            let presenter = create_presenter(&config)?;
            presenter.show(&Presentation::test(title, message)).await?;
            println!("Test notification sent.");
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("Config path: {}\n", DosewatchConfig::default_path().display());
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Reset => {
                DosewatchConfig::default().save()?;
                println!("Configuration reset to defaults.");
                Ok(())
            }
        },
    }
}

/// The long-running host: dispatcher loop, wake bridge, messaging service,
/// and (when enabled) the reconciliation loop.
async fn serve(config: DosewatchConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = create_store(&config)?;
    let presenter = create_presenter(&config)?;

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let (wake_tx, wake_rx) = tokio::sync::mpsc::unbounded_channel();
    let bridge = create_bridge(&config, clock.clone(), wake_tx)?;

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        presenter.clone(),
        clock.clone(),
        config.dispatch.window_secs,
        events_tx.clone(),
    ));
    let dispatcher_handle = Arc::clone(&dispatcher).spawn(
        std::time::Duration::from_secs(config.dispatch.tick_secs),
        wake_rx,
    );

    // Messaging surface for foreground collaborators. The handle must stay
    // alive for the lifetime of the host; the service stops when the last
    // handle is dropped.
    let (service, _service_handle) = AlarmService::new(
        store.clone(),
        dispatcher.clone(),
        presenter.clone(),
        Some(bridge.clone()),
        clock.clone(),
        config.bridge.lookahead_hours,
    );
    tokio::spawn(service.run());

    // Domain events flow up to collaborators; this host just logs them.
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                DomainEvent::PermissionProblem { detail } => {
                    tracing::warn!("⚠️ Action required: {detail}");
                }
                DomainEvent::StorageProblem { detail } => {
                    tracing::warn!("⚠️ Storage problem: {detail}");
                }
                DomainEvent::DoseTaken { alarm_id, at } => {
                    tracing::info!("Dose taken for {alarm_id} at {at}");
                }
                DomainEvent::OpenRequested { alarm_id } => {
                    tracing::info!("Open requested for {alarm_id}");
                }
            }
        }
    });

    // Startup counts as a foreground resume: reserve the lookahead window.
    let lookahead = chrono::Duration::hours(config.bridge.lookahead_hours);
    let call_timeout = std::time::Duration::from_millis(config.bridge.call_timeout_ms);
    if let Err(e) = reschedule_window(
        store.as_ref(),
        bridge.as_ref(),
        clock.as_ref(),
        lookahead,
        call_timeout,
    )
    .await
    {
        let _ = events_tx.send(DomainEvent::PermissionProblem {
            detail: e.to_string(),
        });
    }

    // Reconciliation loop: fail-open, local dispatch never waits on it.
    if config.sync.enabled {
        let remote = Arc::new(HttpRemoteStore::new(&config.sync)?);
        let reconciler = Reconciler::new(
            store.clone(),
            remote,
            clock.clone(),
            config.sync.grace_secs,
        );
        let store = store.clone();
        let bridge = bridge.clone();
        let clock = clock.clone();
        let interval_secs = config.sync.interval_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match reconciler.run_once().await {
                    Ok(report) => {
                        tracing::info!(
                            "Sync: pulled {}, pushed {}, deleted {}",
                            report.pulled,
                            report.pushed,
                            report.deleted
                        );
                        // A successful pass may have changed fire times.
                        if let Err(e) = reschedule_window(
                            store.as_ref(),
                            bridge.as_ref(),
                            clock.as_ref(),
                            lookahead,
                            call_timeout,
                        )
                        .await
                        {
                            tracing::warn!("Reschedule after sync failed: {e}");
                        }
                    }
                    Err(e) => tracing::warn!("Sync pass failed, retrying next interval: {e}"),
                }
            }
        });
    }

    tracing::info!(
        "Dosewatch serving (tick {}s, window {}s, bridge {})",
        config.dispatch.tick_secs,
        config.dispatch.window_secs,
        bridge.name()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    dispatcher_handle.stop().await;
    Ok(())
}
