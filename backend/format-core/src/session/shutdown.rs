//! Acknowledge-then-drain termination.
//!
//! A termination request flips the session to `Draining` and returns
//! immediately so the handler can send its acknowledgement. The drain itself
//! starts after [`DrainPolicy::ack_delay`]: the listener stops accepting,
//! in-flight requests finish, and in [`DrainMode::Force`] whatever is still
//! open after [`DrainPolicy::grace_period`] is dropped.

use crate::session::ServerSession;

use std::fmt::Display;
use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::spawn as TokioSpawn;
use tokio::time::sleep as TokioSleep;

/// Runs once the drain finished, before the process exits.
pub type FinalizeHook = Box<dyn FnOnce(&ServerSession) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Drop connections still open when the grace period expires.
    Force,
    /// Wait for every in-flight request, however long it takes.
    Cooperative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    pub ack_delay: Duration,
    pub grace_period: Duration,
    pub mode: DrainMode,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            ack_delay: Duration::from_millis(200),
            grace_period: Duration::from_secs(5),
            mode: DrainMode::Force,
        }
    }
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    session: Arc<ServerSession>,
    policy: DrainPolicy,
    drain_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    pub fn new(session: Arc<ServerSession>, policy: DrainPolicy) -> Self {
        let (drain_tx, _) = watch::channel(false);
        Self {
            session,
            policy,
            drain_tx: Arc::new(drain_tx),
        }
    }

    pub fn session(&self) -> &Arc<ServerSession> {
        &self.session
    }

    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }

    /// Termination requested over HTTP: drain after the acknowledgement delay.
    ///
    /// Returns `false` when a drain was already requested.
    pub fn request(&self) -> bool {
        self.trigger(self.policy.ack_delay)
    }

    /// Termination with no response to flush (OS signal).
    pub fn request_now(&self) -> bool {
        self.trigger(Duration::ZERO)
    }

    fn trigger(&self, delay: Duration) -> bool {
        if !self.session.begin_draining() {
            return false;
        }

        let drain_tx = Arc::clone(&self.drain_tx);
        TokioSpawn(async move {
            if !delay.is_zero() {
                TokioSleep(delay).await;
            }
            info!("Stopping listener, waiting for in-flight requests");
            drain_tx.send_replace(true);
        });

        true
    }

    /// Resolves when the listener should stop accepting connections.
    pub fn drain_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut drain_rx = self.drain_tx.subscribe();
        async move {
            // An error means the coordinator is gone, which is a drain too.
            let _ = drain_rx.wait_for(|started| *started).await;
        }
    }

    /// Resolves when remaining connections should be dropped. Never resolves
    /// in cooperative mode.
    pub fn grace_expired(&self) -> impl Future<Output = ()> + Send + 'static {
        let drain = self.drain_signal();
        let policy = self.policy;
        async move {
            drain.await;
            match policy.mode {
                DrainMode::Force => TokioSleep(policy.grace_period).await,
                DrainMode::Cooperative => pending::<()>().await,
            }
        }
    }

    /// Drive `serve` (already wired to [`Self::drain_signal`]) to the end of
    /// the drain, then mark the session terminated and run the hook.
    ///
    /// Serve errors are logged; the session ends up `Terminated` regardless.
    pub async fn run_until_terminated<F, E>(&self, serve: F, on_terminated: Option<FinalizeHook>)
    where
        F: Future<Output = Result<(), E>>,
        E: Display,
    {
        let grace_expired = self.grace_expired();
        tokio::pin!(serve);
        tokio::pin!(grace_expired);

        tokio::select! {
            result = &mut serve => match result {
                Ok(()) => info!("All connections drained"),
                Err(e) => error!("Error while draining connections: {e}"),
            },
            _ = &mut grace_expired => warn!(
                "Grace period of {:?} expired, closing remaining connections",
                self.policy.grace_period
            ),
        }

        self.session.mark_terminated();

        if let Some(hook) = on_terminated {
            hook(&self.session);
        }
    }

    /// Trigger an immediate drain on SIGTERM or Ctrl-C.
    pub fn listen_for_signals(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        TokioSpawn(async move {
            wait_for_termination_signal().await;
            if coordinator.request_now() {
                info!("Graceful shutdown triggered by signal");
            }
        });
    }
}

async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                }
                return;
            }
            Err(e) => warn!("Failed to register SIGTERM handler: {e}"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {e}");
            pending::<()>().await;
        }
    }
}
