use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use hapsync_core::ReconcileConfig;
use hapsync_sync::{openssh_synchronizer, InputPaths, ReconcileReport, SyncError, Synchronizer};

use crate::error::{io_err, DaemonError};
use crate::paths::{canonical_file_path, watch_dirs, DEBOUNCE_RETENTION, DEBOUNCE_WINDOW};

/// Builds a [`Synchronizer`] whenever the configuration changes.
pub type SynchronizerFactory =
    Box<dyn Fn(ReconcileConfig) -> Result<Synchronizer, SyncError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub inputs: InputPaths,
    /// Run a pass at this period even when no file changed.
    pub interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Startup,
    FileChanged(PathBuf),
    Interval,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Startup => write!(f, "startup"),
            Trigger::FileChanged(path) => write!(f, "change:{}", path.display()),
            Trigger::Interval => write!(f, "interval"),
        }
    }
}

/// Start the watch runtime and block the current thread until it exits.
pub fn start_blocking(options: WatchOptions) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Run the watch runtime against the host named in the configuration.
pub async fn run(options: WatchOptions) -> Result<(), DaemonError> {
    run_with(options, Box::new(openssh_synchronizer)).await
}

/// Run the watch runtime with a custom synchronizer factory.
///
/// One pass runs at startup, then one per debounced change of the config or
/// topology file and per interval tick. Ctrl-c stops the runtime and closes
/// the remote session.
pub async fn run_with(options: WatchOptions, factory: SynchronizerFactory) -> Result<(), DaemonError> {
    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    trigger_tx
        .send(Trigger::Startup)
        .await
        .map_err(|_| DaemonError::ChannelClosed("trigger"))?;

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let inputs = options.inputs.clone();
        let trigger_tx = trigger_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = watcher_task(inputs, trigger_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let ticker_handle = {
        let shutdown_rx = shutdown_tx.subscribe();
        let interval = options.interval;
        tokio::spawn(async move { ticker_task(interval, trigger_tx, shutdown_rx).await })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let processor = Processor::new(options.inputs, factory);
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = processor_task(processor, trigger_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task {
                            task: "signal_handler",
                            reason: format!("ctrl-c handler failed: {err}"),
                        }),
                    }
                }
            }
        })
    };

    let (watcher_result, ticker_result, processor_result, signal_result) =
        tokio::join!(watcher_handle, ticker_handle, processor_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("ticker", ticker_result)?;
    handle_join("processor", processor_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Runs passes, keeping one [`Synchronizer`] (and its session) alive for as
/// long as the configuration stays the same.
pub struct Processor {
    inputs: InputPaths,
    factory: SynchronizerFactory,
    current: Option<Synchronizer>,
}

impl Processor {
    pub fn new(inputs: InputPaths, factory: SynchronizerFactory) -> Self {
        Self {
            inputs,
            factory,
            current: None,
        }
    }

    /// Reload both input files and run one reconcile pass.
    pub async fn pass(&mut self) -> Result<ReconcileReport, DaemonError> {
        let (config, topology) = self.inputs.load()?;

        let synchronizer = match self.current.take() {
            Some(existing) if existing.config() == &config => existing,
            previous => {
                if let Some(old) = previous {
                    tracing::info!("configuration changed, reconnecting");
                    release(&old).await;
                }
                (self.factory)(config)?
            }
        };

        let result = synchronizer.reconcile(&topology).await;
        self.current = Some(synchronizer);
        Ok(result?)
    }

    /// Close the remote session, if any.
    pub async fn shutdown(&mut self) {
        if let Some(synchronizer) = self.current.take() {
            release(&synchronizer).await;
        }
    }
}

async fn release(synchronizer: &Synchronizer) {
    if let Err(err) = synchronizer.release().await {
        tracing::warn!(error = %err, "failed to close remote session");
    }
}

async fn processor_task(
    mut processor: Processor,
    mut trigger_rx: mpsc::Receiver<Trigger>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            trigger = trigger_rx.recv() => {
                let Some(trigger) = trigger else { break };
                // Every pass re-reads both files, so queued triggers are covered by this one.
                let mut coalesced = 0usize;
                while trigger_rx.try_recv().is_ok() {
                    coalesced += 1;
                }

                match processor.pass().await {
                    Ok(report) => {
                        tracing::info!(
                            trigger = %trigger,
                            coalesced,
                            written = report.written(),
                            reloaded = report.reloaded,
                            orphans = report.orphans.len(),
                            duration_ms = report.duration_ms,
                            "reconcile pass completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(trigger = %trigger, error = %err, "reconcile pass failed");
                    }
                }
            }
        }
    }

    processor.shutdown().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

async fn watcher_task(
    inputs: InputPaths,
    trigger_tx: mpsc::Sender<Trigger>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let targets: Vec<PathBuf> = [&inputs.config, &inputs.topology]
        .into_iter()
        .map(|path| canonical_file_path(path))
        .collect();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    for dir in watch_dirs(&targets) {
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %dir.display(), "watching directory");
    }

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }

                for path in event.paths {
                    let path = canonical_file_path(&path);
                    if !targets.contains(&path) {
                        continue;
                    }
                    if !should_process_event(&mut debounce, &path, Instant::now()) {
                        continue;
                    }
                    tracing::debug!(path = %path.display(), "input changed");
                    if trigger_tx.send(Trigger::FileChanged(path)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

async fn ticker_task(
    interval: Option<Duration>,
    trigger_tx: mpsc::Sender<Trigger>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let Some(period) = interval else {
        let _ = shutdown_rx.recv().await;
        return Ok(());
    };

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if trigger_tx.send(Trigger::Interval).await.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= DEBOUNCE_RETENTION);
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task,
            reason: format!("join failure: {err}"),
        }),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
