//! SIGINT/SIGTERM handling.
//!
//! A background thread runs a single-threaded tokio runtime that waits for a
//! termination signal and cancels the run's [`CancellationToken`]. The
//! executor checks the token before dispatching each job, so running
//! conversions finish and their outputs are kept. A second signal exits
//! immediately with code 130.
//!
//! Install the handler only after interactive prompts are done: while it is
//! active, Ctrl+C no longer kills the process.

use std::io;
use tokio_util::sync::CancellationToken;

/// Exit code for a run ended by a signal.
pub const EXIT_CANCELLED: i32 = 130;

/// Start listening for termination signals.
pub fn install(token: CancellationToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    #[cfg(unix)]
    let mut signals = runtime.block_on(async { unix::Signals::new() })?;

    std::thread::Builder::new()
        .name("media-batch-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                #[cfg(unix)]
                let name = signals.next().await;
                #[cfg(not(unix))]
                let name = tokio::signal::ctrl_c()
                    .await
                    .map(|()| "Ctrl-C")
                    .unwrap_or("Ctrl-C");

                tracing::warn!(signal = name, "stopping: no new jobs, running ones finish");
                eprintln!("\nStopping after running jobs finish (press Ctrl-C again to abort)");
                token.cancel();

                #[cfg(unix)]
                signals.next().await;
                #[cfg(not(unix))]
                let _ = tokio::signal::ctrl_c().await;
            });
            std::process::exit(EXIT_CANCELLED);
        })?;
    Ok(())
}

#[cfg(unix)]
mod unix {
    use std::io;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    pub struct Signals {
        interrupt: Signal,
        terminate: Signal,
    }

    impl Signals {
        /// Must be called inside the runtime.
        pub fn new() -> io::Result<Self> {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        /// Wait for the next signal and return its name.
        pub async fn next(&mut self) -> &'static str {
            tokio::select! {
                _ = self.interrupt.recv() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
            }
        }
    }
}
