use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding the configuration files, relative to the engine root.
const CONFIG_DIR: &str = "configuration";

/// File extensions probed for each configuration file, in priority order.
const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Environment variable prefix for overrides (`APP_CLIENT__MAX_ATTEMPTS`).
const ENV_PREFIX: &str = "APP";

/// Separator for nested keys inside override variable names.
const ENV_KEY_SEPARATOR: &str = "__";

/// Separator for list values inside override variables.
const ENV_LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration types loaded through [`load_config`].
pub trait Config {
    /// Keys whose env-var overrides are parsed as comma-separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors raised while locating, parsing, or deserializing configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigDir(PathBuf),

    #[error("no `{stem}.(yaml|yml|json)` configuration file in `{directory}`")]
    MissingFile { stem: String, directory: PathBuf },

    #[error("failed to read configuration: {0}")]
    Read(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] io::Error),
}

/// Loads configuration from the `configuration/` directory under the current
/// working directory. See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let root = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    load_config_from(&root)
}

/// Loads configuration from `<root>/configuration`.
///
/// Three sources layer in order: `base.(yaml|yml|json)`, the file named after
/// the active [`Environment`], and `APP_`-prefixed environment variables with
/// `__` separating nested keys. Later sources win.
pub fn load_config_from<T>(root: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = root.join(CONFIG_DIR);
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigDir(directory));
    }

    let environment = Environment::load()?;
    let base_file = locate_file(&directory, "base")?;
    let environment_file = locate_file(&directory, environment.as_str())?;

    let mut overrides = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_KEY_SEPARATOR);
    if !T::LIST_PARSE_KEYS.is_empty() {
        overrides = overrides
            .try_parsing(true)
            .list_separator(ENV_LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            overrides = overrides.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(base_file))
        .add_source(config::File::from(environment_file))
        .add_source(overrides)
        .build()
        .map_err(LoadConfigError::Read)?;

    settings
        .try_deserialize()
        .map_err(LoadConfigError::Deserialize)
}

/// Finds `<stem>.<ext>` in the directory, probing the supported extensions.
fn locate_file(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    for extension in EXTENSIONS {
        let path = directory.join(format!("{stem}.{extension}"));
        if path.is_file() {
            return Ok(path);
        }
    }

    Err(LoadConfigError::MissingFile {
        stem: stem.to_string(),
        directory: directory.to_path_buf(),
    })
}
