use std::path::{Path, PathBuf};

/// Where the configuration file is read from, and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub required: bool,
}

impl ConfigSource {
    /// A path the operator named explicitly; missing is an error.
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }
}

/// `VIGIL_CONFIG_PATH`, then `~/.vigil/config.yaml`, then `./vigil.yaml`.
/// Only the first is required to exist; otherwise defaults apply.
pub fn config_source<F>(lookup: F) -> ConfigSource
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("VIGIL_CONFIG_PATH").filter(|path| !path.trim().is_empty()) {
        return ConfigSource::explicit(path);
    }

    if let Some(home) = lookup("HOME").filter(|home| !home.is_empty()) {
        return ConfigSource {
            path: Path::new(&home).join(".vigil").join("config.yaml"),
            required: false,
        };
    }

    ConfigSource {
        path: PathBuf::from("vigil.yaml"),
        required: false,
    }
}
