use crate::INSTANCE_ID_FLAG;
use crate::config::InstanceMode;
use crate::error::identity::IdentityError;

use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

/// The id ends up in a file name, so path separators and the like are refused.
const INSTANCE_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

static INSTANCE_ID_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_instance_id_regex() -> &'static Regex {
    INSTANCE_ID_REGEX.get_or_init(|| Regex::new(INSTANCE_ID_PATTERN).expect("valid regex pattern"))
}

/// Caller-supplied identifier distinguishing concurrent instances that share
/// a working directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    #[track_caller]
    pub fn parse(value: &str) -> Result<Self, IdentityError> {
        if !get_instance_id_regex().is_match(value) {
            return Err(IdentityError::Invalid {
                message: format!(
                    "'{value}' is not a valid instance id (allowed: letters, digits, '.', '_', '-')"
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InstanceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

/// Find the first `--node-server-instance-id=<value>` argument.
///
/// # Errors
///
/// * [`IdentityError::Missing`] - no argument carries the flag
/// * [`IdentityError::Invalid`] - the first matching value is empty or unsafe
#[track_caller]
pub fn resolve<I, S>(args: I) -> Result<InstanceId, IdentityError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let value = args
        .into_iter()
        .find_map(|arg| arg.as_ref().strip_prefix(INSTANCE_ID_FLAG).map(str::to_owned))
        .ok_or_else(|| IdentityError::Missing {
            message: format!("No instance id provided (expected {INSTANCE_ID_FLAG}<id>)"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let instance_id = InstanceId::parse(&value)?;
    info!("Resolved instance id: {instance_id}");
    Ok(instance_id)
}

/// Resolve the identity the configured mode asks for.
///
/// Single-instance mode never looks at the arguments.
#[track_caller]
pub fn resolve_for_mode<I, S>(mode: InstanceMode, args: I) -> Result<Option<InstanceId>, IdentityError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match mode {
        InstanceMode::Single => {
            debug!("Single-instance mode, instance id not required");
            Ok(None)
        }
        InstanceMode::Multi => resolve(args).map(Some),
    }
}
