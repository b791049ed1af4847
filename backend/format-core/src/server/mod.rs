//! HTTP server composition root.
//!
//! [`HttpServer::start`] binds an ephemeral loopback port, starts serving,
//! publishes the port file and hands back a [`RunningServer`]. Serving starts
//! before publication, so every endpoint is reachable by the time a reader
//! sees the file.

pub mod backend;
pub mod routes;

pub use backend::Backend;

use crate::error::server::ServerError;
use crate::session::publish::PortPublisher;
use crate::session::shutdown::{DrainPolicy, FinalizeHook, ShutdownCoordinator};
use crate::session::{InstanceId, ServerSession};
use crate::{DEFAULT_BODY_LIMIT_BYTES, SERVER_BASE_URL, SERVER_HOSTNAME};

use common::ErrorLocation;

use std::future::IntoFuture;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;

pub struct HttpServer {
    backend: Backend,
    port_file_dir: PathBuf,
    instance_id: Option<InstanceId>,
    body_limit: usize,
    drain_policy: DrainPolicy,
    on_terminated: Option<FinalizeHook>,
    handle_os_signals: bool,
}

impl HttpServer {
    pub fn new(backend: Backend, port_file_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            port_file_dir: port_file_dir.into(),
            instance_id: None,
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
            drain_policy: DrainPolicy::default(),
            on_terminated: None,
            handle_os_signals: false,
        }
    }

    pub fn instance_id(mut self, instance_id: Option<InstanceId>) -> Self {
        self.instance_id = instance_id;
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    /// Runs once the session is terminated.
    pub fn on_terminated(mut self, hook: FinalizeHook) -> Self {
        self.on_terminated = Some(hook);
        self
    }

    /// Drain on SIGTERM / Ctrl-C as well. Off by default so that tests running
    /// many servers in one process do not all react to one signal.
    pub fn handle_os_signals(mut self, enabled: bool) -> Self {
        self.handle_os_signals = enabled;
        self
    }

    /// Bind, serve and publish.
    ///
    /// # Errors
    ///
    /// Only binding is fatal. A failed port file publication is logged and
    /// the server keeps running.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let backend_kind = self.backend.kind();

        let listener = TcpListener::bind((SERVER_HOSTNAME, 0))
            .await
            .map_err(|e| ServerError::Bind {
                message: format!("Failed to bind {SERVER_HOSTNAME}:0: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        let port = listener
            .local_addr()
            .map_err(|e| ServerError::Bind {
                message: format!("Failed to read bound address: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?
            .port();

        let session = Arc::new(ServerSession::new(port, self.instance_id));
        let coordinator = Arc::new(ShutdownCoordinator::new(
            Arc::clone(&session),
            self.drain_policy,
        ));

        if self.handle_os_signals {
            coordinator.listen_for_signals();
        }

        let app = routes::app(self.backend, Arc::clone(&coordinator), self.body_limit);

        let serve_coordinator = Arc::clone(&coordinator);
        let on_terminated = self.on_terminated;
        let task = TokioSpawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(serve_coordinator.drain_signal())
                .into_future();
            serve_coordinator
                .run_until_terminated(serve, on_terminated)
                .await;
        });

        info!("{backend_kind} server listening on {SERVER_BASE_URL}:{port}");

        let publisher = PortPublisher::new(&self.port_file_dir);
        let port_file = match publisher.publish(port, session.instance_id()).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to publish port file, continuing without it: {e}");
                None
            }
        };

        Ok(RunningServer {
            session,
            coordinator,
            port_file,
            task,
        })
    }
}

/// Handle to a started server.
pub struct RunningServer {
    session: Arc<ServerSession>,
    coordinator: Arc<ShutdownCoordinator>,
    port_file: Option<PathBuf>,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn port(&self) -> u16 {
        self.session.port()
    }

    pub fn base_url(&self) -> String {
        format!("{SERVER_BASE_URL}:{}", self.port())
    }

    pub fn session(&self) -> &Arc<ServerSession> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// `None` when publication failed.
    pub fn port_file(&self) -> Option<&Path> {
        self.port_file.as_deref()
    }

    /// Wait until the session is terminated.
    ///
    /// A panicked serve task is logged and treated as terminated.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            error!("Server task on port {} ended abnormally: {e}", self.session.port());
        }
    }
}
