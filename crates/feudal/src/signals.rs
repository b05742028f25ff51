//! Signal handling for graceful server shutdown and settings reload.

use tokio::signal;
use tracing::info;

/// Waits until the process is asked to terminate.
///
/// * **Unix platforms**: SIGINT and SIGTERM
/// * **Windows**: Ctrl+C
pub async fn wait_for_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    wait_for_shutdown_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

pub async fn wait_for_shutdown_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}

/// Stream of reload requests (SIGHUP).
#[cfg(unix)]
pub struct ReloadSignal {
    hangup: signal::unix::Signal,
}

#[cfg(unix)]
impl ReloadSignal {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let hangup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
        Ok(Self { hangup })
    }

    /// Resolves on the next SIGHUP; `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<()> {
        self.hangup.recv().await
    }
}
