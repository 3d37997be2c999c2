use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::MissedTickBehavior;

use ovpn_core::paths::{run_dir, socket_path};
use ovpn_core::Config;
use ovpn_sync::{CycleSummary, Pipeline};

use crate::error::{io_err, DaemonError};
use crate::protocol::{DaemonRequest, DaemonResponse, StopAck};
use crate::state::{DaemonState, DaemonStatus};

/// Timing knobs for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub poll_interval: Duration,
    pub cycle_timeout: Duration,
}

impl Schedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            cycle_timeout: config.cycle_timeout(),
        }
    }
}

struct SyncJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<CycleSummary, String>>,
}

type SharedState = Arc<RwLock<DaemonState>>;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the scheduler against the store described by `config`.
pub async fn run(home: PathBuf, config: Config) -> Result<(), DaemonError> {
    let pipeline = Pipeline::from_config(&home, &config);
    tracing::info!(
        status_log = %config.status_log.display(),
        directory = %config.directory_path_at(&home).display(),
        poll_interval_secs = config.poll_interval_secs,
        "starting sync daemon",
    );
    run_with(home, pipeline, Schedule::from_config(&config)).await
}

/// Run the scheduler with an explicit pipeline until `stop` or Ctrl-C.
pub async fn run_with(
    home: PathBuf,
    pipeline: Pipeline,
    schedule: Schedule,
) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let state: SharedState = Arc::new(RwLock::new(DaemonState::new(Utc::now())));
    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Every task holds its receiver before any task can broadcast.
    let ticker_rx = shutdown_tx.subscribe();
    let processor_rx = shutdown_tx.subscribe();
    let socket_rx = shutdown_tx.subscribe();
    let mut signal_rx = shutdown_tx.subscribe();

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = ticker_task(sync_tx, schedule.poll_interval, ticker_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(
                pipeline,
                state,
                schedule.cycle_timeout,
                sync_rx,
                processor_rx,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let state = state.clone();
        let sync_tx = sync_tx.clone();
        let context = StatusContext::new(&pipeline, schedule);
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                state,
                context,
                sync_tx,
                shutdown.clone(),
                socket_rx,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    drop(sync_tx);

    let (ticker_result, processor_result, socket_result, signal_result) = tokio::join!(
        ticker_handle,
        processor_handle,
        socket_handle,
        signal_handle
    );

    handle_join("ticker", ticker_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("sync daemon stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Ticker and worker
// ---------------------------------------------------------------------------

/// Enqueue one cycle now and one per `period` after that. A tick that comes
/// due while the previous cycle is still running is dropped.
async fn ticker_task(
    sync_tx: mpsc::Sender<SyncJob>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match enqueue_sync(&sync_tx, "timer").await {
                    Ok(summary) => tracing::debug!(
                        clients = summary.clients_seen,
                        duration_ms = summary.duration_ms,
                        "scheduled cycle completed",
                    ),
                    Err(DaemonError::ChannelClosed(_)) => break,
                    Err(err) => tracing::warn!(error = %err, "scheduled cycle failed"),
                }
            }
        }
    }
    Ok(())
}

async fn sync_processor_task(
    pipeline: Pipeline,
    state: SharedState,
    cycle_timeout: Duration,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = run_cycle(&pipeline, cycle_timeout)
                    .await
                    .map_err(|err| err.to_string());
                if let Err(err) = &outcome {
                    tracing::error!(source = job.source, error = %err, "sync cycle failed");
                }
                state.write().await.record(job.source, &outcome);
                let _ = job.respond_to.send(outcome);
            }
        }
    }
    Ok(())
}

/// One cycle on the blocking pool under `deadline`. On timeout the blocking
/// task keeps running; the reconciler refuses new cycles until it finishes.
async fn run_cycle(pipeline: &Pipeline, deadline: Duration) -> Result<CycleSummary, DaemonError> {
    let pipeline = pipeline.clone();
    let task = tokio::task::spawn_blocking(move || pipeline.run());
    match tokio::time::timeout(deadline, task).await {
        Err(_) => Err(DaemonError::CycleTimeout {
            secs: deadline.as_secs(),
        }),
        Ok(Err(join)) => Err(DaemonError::Protocol(format!("sync task join error: {join}"))),
        Ok(Ok(Err(sync))) => Err(DaemonError::Protocol(sync.to_string())),
        Ok(Ok(Ok(summary))) => Ok(summary),
    }
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    source: &'static str,
) -> Result<CycleSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

// ---------------------------------------------------------------------------
// Control socket
// ---------------------------------------------------------------------------

/// Static facts echoed by `status`.
#[derive(Debug, Clone)]
struct StatusContext {
    status_log: PathBuf,
    schedule: Schedule,
}

impl StatusContext {
    fn new(pipeline: &Pipeline, schedule: Schedule) -> Self {
        Self {
            status_log: pipeline.reconciler().status_log().to_path_buf(),
            schedule,
        }
    }
}

async fn socket_server_task(
    home: PathBuf,
    state: SharedState,
    context: StatusContext,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let state = state.clone();
                let context = context.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, state, context, sync_tx, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    state: SharedState,
    context: StatusContext,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                let reply = DaemonResponse::<()>::error(format!("invalid request: {err}"));
                write_response(&mut writer, &reply).await?;
                continue;
            }
        };

        match request {
            DaemonRequest::Status => {
                let status = status_report(&home, &state, &context).await;
                write_response(&mut writer, &DaemonResponse::ok(status)).await?;
            }
            DaemonRequest::Sync => {
                let outcome = enqueue_sync(&sync_tx, "socket")
                    .await
                    .map_err(|err| err.to_string());
                write_response(&mut writer, &DaemonResponse::from(outcome)).await?;
            }
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                let ack = DaemonResponse::ok(StopAck { stopping: true });
                write_response(&mut writer, &ack).await?;
                break;
            }
        }
    }

    Ok(())
}

async fn status_report(home: &Path, state: &SharedState, context: &StatusContext) -> DaemonStatus {
    DaemonStatus {
        running: true,
        pid: std::process::id(),
        socket: socket_path(home),
        status_log: context.status_log.clone(),
        poll_interval_secs: context.schedule.poll_interval.as_secs(),
        cycle_timeout_secs: context.schedule.cycle_timeout.as_secs(),
        state: state.read().await.clone(),
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

async fn write_response<T: Serialize>(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse<T>,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
