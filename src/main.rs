use anyhow::{Context, Result};
use skyy::config::Config;
use skyy::RunSummary;
use skyy::defaults::gpu_backend;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::{JoinError, JoinHandle};
use tracing_subscriber::EnvFilter;

type KioskTask = JoinHandle<skyy::Result<RunSummary>>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = load_config()?;
    tracing::info!("skyy {} ({})", skyy::version_string(), gpu_backend());

    let stop = Arc::new(AtomicBool::new(false));
    let kiosk_stop = Arc::clone(&stop);
    let kiosk = tokio::task::spawn_blocking(move || skyy::app::run(&config, kiosk_stop));
    supervise(kiosk, &stop, shutdown_signal()).await
}

/// Wait for the kiosk to exit or a shutdown signal, whichever comes first.
///
/// Raises the stop flag, even when the signal handler fails, unless the
/// kiosk exited on its own.
async fn supervise<S>(mut kiosk: KioskTask, stop: &AtomicBool, signal: S) -> Result<()>
where
    S: Future<Output = Result<()>>,
{
    let signal = tokio::select! {
        joined = &mut kiosk => return finish(joined),
        signal = signal => signal,
    };
    stop.store(true, Ordering::SeqCst);

    match signal {
        Ok(()) => {
            tracing::info!("shutdown requested, finishing current cycle");
            finish(kiosk.await)
        }
        Err(e) => {
            tracing::error!("signal handling failed, stopping kiosk: {:#}", e);
            if let Err(kiosk_error) = finish(kiosk.await) {
                tracing::error!("{:#}", kiosk_error);
            }
            Err(e.context("failed to listen for shutdown signals"))
        }
    }
}

fn finish(joined: std::result::Result<skyy::Result<RunSummary>, JoinError>) -> Result<()> {
    let summary = joined.context("kiosk thread panicked")??;
    tracing::info!(
        cycles = summary.cycles,
        compliments = summary.compliments,
        "kiosk exited"
    );
    Ok(())
}

/// Load configuration: file (or defaults), then env overrides, then validation.
fn load_config() -> Result<Config> {
    let path = Config::default_path();
    let config = Config::load_or_default(&path)?.with_env_overrides();
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Kiosk stand-in that runs until the stop flag is raised.
    fn kiosk_until_stopped(stop: &Arc<AtomicBool>) -> KioskTask {
        let stop = Arc::clone(stop);
        tokio::task::spawn_blocking(move || {
            let mut summary = RunSummary::default();
            while !stop.load(Ordering::SeqCst) {
                summary.cycles += 1;
                thread::sleep(Duration::from_millis(1));
            }
            Ok(summary)
        })
    }

    #[tokio::test]
    async fn test_signal_stops_kiosk() {
        let stop = Arc::new(AtomicBool::new(false));
        let kiosk = kiosk_until_stopped(&stop);

        supervise(kiosk, &stop, async { Ok(()) }).await.unwrap();

        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_signal_setup_failure_still_stops_kiosk() {
        let stop = Arc::new(AtomicBool::new(false));
        let kiosk = kiosk_until_stopped(&stop);

        let result = supervise(kiosk, &stop, async {
            Err(anyhow::anyhow!("signal handler unavailable"))
        })
        .await;

        assert!(stop.load(Ordering::SeqCst));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("signal handler unavailable"));
    }

    #[tokio::test]
    async fn test_kiosk_exit_without_signal() {
        let stop = Arc::new(AtomicBool::new(false));
        let kiosk = tokio::task::spawn_blocking(|| Ok(RunSummary::default()));

        supervise(kiosk, &stop, std::future::pending()).await.unwrap();

        assert!(!stop.load(Ordering::SeqCst));
    }
}
