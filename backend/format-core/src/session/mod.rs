//! Per-process server session and its lifecycle pieces.
//!
//! This module provides:
//! - [`ServerSession`]: the bound port, the instance id and the lifecycle state
//! - [`identity`]: instance id resolution from process arguments
//! - [`publish`]: atomic readiness publication through the port file
//! - [`shutdown`]: acknowledge-then-drain termination
//!
//! # Lifecycle
//!
//! `Listening → Draining → Terminated`. The state only moves forward; the
//! session is created once at startup and shared by reference with every
//! handler and with the shutdown coordinator.

pub mod identity;
pub mod publish;
pub mod shutdown;

pub use identity::InstanceId;

use log::{debug, info};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Listening,
    Draining,
    Terminated,
}

/// The single long-lived entity of an instance.
#[derive(Debug)]
pub struct ServerSession {
    port: u16,
    instance_id: Option<InstanceId>,
    state: watch::Sender<LifecycleState>,
}

impl ServerSession {
    pub fn new(port: u16, instance_id: Option<InstanceId>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Listening);
        Self {
            port,
            instance_id,
            state,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `None` in single-instance mode.
    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// `Listening → Draining`. Returns `false` if the session already left
    /// `Listening`, so only the first termination request starts a drain.
    pub(crate) fn begin_draining(&self) -> bool {
        let transitioned = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Listening {
                *state = LifecycleState::Draining;
                true
            } else {
                false
            }
        });

        if transitioned {
            info!("Session on port {} is draining", self.port);
        } else {
            debug!("Session on port {} already {:?}", self.port, self.state());
        }
        transitioned
    }

    pub(crate) fn mark_terminated(&self) {
        self.state.send_replace(LifecycleState::Terminated);
        info!("Session on port {} terminated", self.port);
    }
}
