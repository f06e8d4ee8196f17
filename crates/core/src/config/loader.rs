//! Configuration loader for the `.px/` directory.
//!
//! - `config.toml`: execution settings (locality, scheduler, output dir)
//! - `processes.toml`: pre-commands keyed by process name
//! - `pipelines/*.yaml`: pipeline definitions

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::{AppConfig, ConfigFile, ExternalProcessConfig};
use px_protocol::pipeline_models::Pipeline;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the project directory under the root.
pub const PX_DIR: &str = ".px";

/// Load everything under `<root>/.px/`.
///
/// Missing directories and files fall back to defaults. Files that exist but
/// cannot be read or parsed are errors naming the file.
///
/// # Example
///
/// ```rust,no_run
/// use px_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} pipelines", config.pipelines.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let px_dir = root.join(PX_DIR);
    if !px_dir.exists() {
        return Ok(AppConfig::default());
    }

    let mut execution = load_toml::<ConfigFile>(&px_dir.join("config.toml"))?
        .unwrap_or_default()
        .execution;
    if execution.output_dir.is_relative() {
        execution.output_dir = root.join(&execution.output_dir);
    }

    let processes = load_toml::<ExternalProcessConfig>(&px_dir.join("processes.toml"))?
        .unwrap_or_default();
    let pipelines = load_pipelines(&px_dir)?;

    debug!(
        root = %root.display(),
        pipelines = pipelines.len(),
        pre_commands = processes.pre_commands.len(),
        "loaded configuration"
    );
    Ok(AppConfig {
        execution,
        processes: Arc::new(processes),
        pipelines,
    })
}

/// Parse a TOML file, or `None` when it does not exist.
fn load_toml<T: DeserializeOwned>(path: &Path) -> ConfigResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Load all pipeline definitions from `pipelines/*.yaml` and `*.yml`.
fn load_pipelines(px_dir: &Path) -> ConfigResult<Vec<Pipeline>> {
    let pipelines_dir = px_dir.join("pipelines");
    if !pipelines_dir.exists() {
        return Ok(Vec::new());
    }

    let mut pipelines = Vec::new();
    let mut names = HashSet::new();

    for entry in WalkDir::new(&pipelines_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: pipelines_dir.clone(),
            source,
        })?;
        let path = entry.path();

        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let pipeline: Pipeline =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        if pipeline.processes.is_empty() {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("pipeline '{}' has no processes", pipeline.name),
            });
        }
        if !names.insert(pipeline.name.clone()) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("duplicate pipeline name '{}'", pipeline.name),
            });
        }

        pipelines.push(pipeline);
    }

    Ok(pipelines)
}
