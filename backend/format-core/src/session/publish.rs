//! Readiness publication through the port file.
//!
//! The parent polls for the final file name, so the port is first written to
//! a temporary sibling and then renamed into place. Rename is the publish
//! point: a reader sees either no file or the complete decimal port.

use crate::error::publish::PublishError;
use crate::session::InstanceId;
use crate::{PORT_FILE_EXTENSION, PORT_FILE_NAME, PORT_FILE_PREFIX, TEMP_FILE_SUFFIX};

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::fs;

/// `server-<id>.port` in multi-instance mode, `server.port` otherwise.
pub fn port_file_name(instance_id: Option<&InstanceId>) -> String {
    match instance_id {
        Some(id) => format!("{PORT_FILE_PREFIX}{id}{PORT_FILE_EXTENSION}"),
        None => PORT_FILE_NAME.to_string(),
    }
}

/// Temporary name the port is written to before the rename.
///
/// Derived from the final name so that instances sharing a directory never
/// write the same temporary file.
pub fn temp_file_name(instance_id: Option<&InstanceId>) -> String {
    format!("{}{TEMP_FILE_SUFFIX}", port_file_name(instance_id))
}

#[derive(Debug, Clone)]
pub struct PortPublisher {
    dir: PathBuf,
}

impl PortPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn port_file_path(&self, instance_id: Option<&InstanceId>) -> PathBuf {
        self.dir.join(port_file_name(instance_id))
    }

    /// Write the port to the temp file, then rename it onto the final name.
    ///
    /// The rename is only attempted after the write fully succeeded. Nothing
    /// is retried; callers log the error and keep serving.
    ///
    /// # Returns
    ///
    /// The path of the published port file.
    pub async fn publish(
        &self,
        port: u16,
        instance_id: Option<&InstanceId>,
    ) -> Result<PathBuf, PublishError> {
        let temp_path = self.dir.join(temp_file_name(instance_id));
        let final_path = self.port_file_path(instance_id);

        debug!("Writing port {port} to {}", temp_path.display());

        fs::write(&temp_path, port.to_string())
            .await
            .map_err(|e| PublishError::Write {
                location: ErrorLocation::from(Location::caller()),
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| PublishError::Rename {
                location: ErrorLocation::from(Location::caller()),
                from: temp_path.clone(),
                to: final_path.clone(),
                source: e,
            })?;

        info!("Published port {port} to {}", final_path.display());
        Ok(final_path)
    }
}
