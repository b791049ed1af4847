use crate::engine::Options;
use crate::error::resolve::ResolveError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use serde_json::Value;
use tokio::fs;

/// Looked up in this order in every directory from the start path upwards.
pub const SEARCH_FILE_NAMES: [&str; 15] = [
    "package.json",
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.yaml",
    ".prettierrc.yml",
    ".prettierrc.json5",
    ".prettierrc.js",
    ".prettierrc.cjs",
    ".prettierrc.mjs",
    ".prettierrc.ts",
    "prettier.config.js",
    "prettier.config.cjs",
    "prettier.config.mjs",
    "prettier.config.ts",
    ".prettierrc.toml",
];

const PACKAGE_JSON: &str = "package.json";
const PACKAGE_JSON_KEY: &str = "prettier";
/// File-pattern specific sections; they never apply without a target file.
const OVERRIDES_KEY: &str = "overrides";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigFormat {
    Json,
    Json5,
    Yaml,
    Toml,
    JsonOrYaml,
    PackageJson,
    Executable,
}

fn detect_format(path: &Path) -> ConfigFormat {
    if path.file_name().is_some_and(|name| name == PACKAGE_JSON) {
        return ConfigFormat::PackageJson;
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => ConfigFormat::Json,
        Some("json5") => ConfigFormat::Json5,
        Some("yaml" | "yml") => ConfigFormat::Yaml,
        Some("toml") => ConfigFormat::Toml,
        Some("js" | "cjs" | "mjs" | "ts" | "cts" | "mts") => ConfigFormat::Executable,
        _ => ConfigFormat::JsonOrYaml,
    }
}

/// Load the style config `path` points at.
///
/// A file is parsed directly. A directory is searched upwards for the first
/// file in [`SEARCH_FILE_NAMES`]; `Ok(None)` means nothing was found (or a
/// `package.json` without a `prettier` key).
pub async fn load_config(path: &Path) -> Result<Option<Options>, ResolveError> {
    let metadata = fs::metadata(path).await.map_err(|e| ResolveError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.is_dir() {
        return match find_config_file(path).await? {
            Some((_, config)) => Ok(Some(config)),
            None => Ok(None),
        };
    }

    load_file(path).await
}

/// First config file found from `start_dir` upwards, with its content.
pub async fn find_config_file(
    start_dir: &Path,
) -> Result<Option<(PathBuf, Options)>, ResolveError> {
    for dir in start_dir.ancestors() {
        for name in SEARCH_FILE_NAMES {
            let candidate = dir.join(name);
            if !is_file(&candidate).await {
                continue;
            }

            trace!("Found style config candidate {}", candidate.display());
            if let Some(config) = load_file(&candidate).await? {
                debug!("Using style config {}", candidate.display());
                return Ok(Some((candidate, config)));
            }
        }
    }

    Ok(None)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

async fn load_file(path: &Path) -> Result<Option<Options>, ResolveError> {
    let format = detect_format(path);

    if format == ConfigFormat::Executable {
        return Err(executable_unsupported(path));
    }

    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| ResolveError::Read {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

    let config = parse(format, &contents, path)?;
    Ok(config.map(without_overrides))
}

#[track_caller]
pub(crate) fn parse(
    format: ConfigFormat,
    contents: &str,
    path: &Path,
) -> Result<Option<Options>, ResolveError> {
    let location = ErrorLocation::from(Location::caller());
    let parse_error = move |reason: String| ResolveError::Parse {
        location,
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = match format {
        ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Json5 => json5::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::JsonOrYaml => match serde_json::from_str(contents) {
            Ok(value) => value,
            Err(_) => serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string()))?,
        },
        ConfigFormat::PackageJson => {
            let manifest: Value =
                serde_json::from_str(contents).map_err(|e| parse_error(e.to_string()))?;
            return match manifest.get(PACKAGE_JSON_KEY) {
                None => Ok(None),
                Some(Value::Object(config)) => Ok(Some(config.clone())),
                Some(Value::String(shared)) => Err(ResolveError::Unsupported {
                    location,
                    path: path.to_path_buf(),
                    reason: format!("shared config reference '{shared}' cannot be resolved"),
                }),
                Some(other) => Err(parse_error(format!(
                    "'{PACKAGE_JSON_KEY}' must be an object, found {other}"
                ))),
            };
        }
        ConfigFormat::Executable => return Err(executable_unsupported(path)),
    };

    match value {
        Value::Object(config) => Ok(Some(config)),
        // An empty YAML document.
        Value::Null => Ok(Some(Options::new())),
        other => Err(parse_error(format!("expected an object, found {other}"))),
    }
}

#[track_caller]
fn executable_unsupported(path: &Path) -> ResolveError {
    ResolveError::Unsupported {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        reason: "executable config files are not evaluated; use JSON, JSON5, YAML or TOML"
            .to_string(),
    }
}

fn without_overrides(mut config: Options) -> Options {
    config.remove(OVERRIDES_KEY);
    config
}
