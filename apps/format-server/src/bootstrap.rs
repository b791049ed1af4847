//! Startup sequence: configuration, identity, logging, backend, server.

use crate::error::FormatServerError;
use crate::logger::initialize as LoggerInitialize;

use format_core::config::{ConfigSources, ServerConfig};
use format_core::server::{Backend, HttpServer};
use format_core::session::identity::resolve_for_mode;
use format_core::session::{InstanceId, ServerSession};

use std::path::{Path, PathBuf};

use log::info;

/// Everything decided before the first byte is logged.
#[derive(Debug)]
pub struct Startup {
    pub config: ServerConfig,
    /// Logged once the logger is up.
    pub sources: ConfigSources,
    pub instance_id: Option<InstanceId>,
    pub port_file_dir: PathBuf,
    pub node_project_dir: PathBuf,
}

/// Resolve configuration and identity.
///
/// # Errors
///
/// Fails on invalid configuration, and in multi-instance mode when `args`
/// carries no usable instance id.
pub fn prepare<I, S>(working_dir: &Path, args: I) -> Result<Startup, FormatServerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (config, sources) = ServerConfig::resolve_with_sources(working_dir)?;
    let instance_id = resolve_for_mode(config.instance_mode, args)?;

    Ok(Startup {
        port_file_dir: config.port_file_dir(working_dir),
        node_project_dir: config.node_project_dir(working_dir),
        config,
        sources,
        instance_id,
    })
}

/// Build the server for a prepared startup, engines driving the installed tools.
pub fn server(startup: &Startup) -> HttpServer {
    let backend = Backend::process_backed(startup.config.backend, &startup.node_project_dir);

    HttpServer::new(backend, &startup.port_file_dir)
        .instance_id(startup.instance_id.clone())
        .body_limit(startup.config.body_limit_bytes)
        .drain_policy(startup.config.shutdown.drain_policy())
        .on_terminated(Box::new(log_termination))
        .handle_os_signals(true)
}

/// Run one instance until it is told to stop.
pub async fn run<I, S>(working_dir: &Path, args: I) -> Result<(), FormatServerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let startup = prepare(working_dir, args)?;

    LoggerInitialize(&startup.port_file_dir, startup.instance_id.as_ref())?;
    startup.sources.log();

    info!(
        "Starting {} format server ({:?} mode) from {}",
        startup.config.backend,
        startup.config.instance_mode,
        working_dir.display()
    );
    info!("Engines resolved from {}", startup.node_project_dir.display());

    let running = server(&startup).start().await?;
    running.wait().await;

    Ok(())
}

fn log_termination(session: &ServerSession) {
    match session.instance_id() {
        Some(id) => info!("Format server {id} on port {} stopped", session.port()),
        None => info!("Format server on port {} stopped", session.port()),
    }
}
