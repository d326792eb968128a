//! Shutdown and scan cancellation coordination
//!
//! Handles process signals and exposes a cheap cancellation handle that scan
//! pipelines poll at fetch-page boundaries. A cancelled scan stops at the
//! next page and persists nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cancellation handle shared between the coordinator and running scans
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        // Release pairs with the Acquire loads in is_cancelled so page-loop
        // checks on other tasks observe the store
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Coordinates graceful shutdown across the application
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    cancel: CancelFlag,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        // Larger channel avoids dropping bursts of shutdown signals
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);

        let coordinator = Self {
            shutdown_tx,
            cancel: CancelFlag::new(),
        };

        (coordinator, shutdown_rx)
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Cancellation handle to pass into scan pipelines
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Trigger shutdown
    pub fn trigger_shutdown(&self) {
        self.cancel.cancel();
        let _ = self.shutdown_tx.send(());
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Install process signal handlers that request shutdown
    ///
    /// A second signal forces immediate exit with status 130.
    pub fn install_signal_handlers(&self) {
        setup_signal_handlers(self.shutdown_tx.clone(), self.cancel.clone());
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>, cancel: CancelFlag) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use std::sync::atomic::AtomicUsize;
        use tokio::signal::unix::{signal, SignalKind};
        let signal_count = Arc::new(AtomicUsize::new(0));
        let signals = [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
        ];

        for kind in signals {
            let tx = shutdown_tx.clone();
            let flag = cancel.clone();
            let sig_ctr = signal_count.clone();

            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    while sig.recv().await.is_some() {
                        let prev = sig_ctr.fetch_add(1, Ordering::AcqRel);
                        flag.cancel();
                        let _ = tx.send(());
                        if prev >= 1 {
                            // Second signal received; forcing immediate exit
                            std::process::exit(130);
                        }
                        break;
                    }
                }
            });
        }

        // Generic ctrl_c fallback for terminals where the specific UNIX
        // signals are not delivered as expected
        {
            let tx = shutdown_tx;
            let flag = cancel;
            let sig_ctr = signal_count;
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let prev = sig_ctr.fetch_add(1, Ordering::AcqRel);
                    flag.cancel();
                    let _ = tx.send(());
                    if prev >= 1 {
                        log::warn!("Ctrl-C received; exiting");
                        std::process::exit(130);
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
                let _ = shutdown_tx.send(());
            }
        });
    }
}
