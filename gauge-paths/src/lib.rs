//! XDG Base Directory paths for gauge.
//!
//! The CLI keeps its files under XDG paths on every platform rather than the
//! platform-native locations.

use std::path::PathBuf;

const APP_DIR: &str = "gauge";

/// Get the gauge config directory.
///
/// Returns `$XDG_CONFIG_HOME/gauge` if set, otherwise `~/.config/gauge`.
/// The user-level `config.toml` lives here.
///
/// # Examples
///
/// ```
/// use gauge_paths::config_dir;
///
/// let config_file = config_dir().join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Get the gauge data directory.
///
/// Returns `$XDG_DATA_HOME/gauge` if set, otherwise `~/.local/share/gauge`.
/// Stored learner profiles live here.
///
/// # Examples
///
/// ```
/// use gauge_paths::data_dir;
///
/// let profiles = data_dir().join("profiles.json");
/// ```
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    if let Ok(base) = std::env::var(var)
        && !base.is_empty()
    {
        PathBuf::from(base).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(home_relative).join(APP_DIR)
    } else {
        PathBuf::from(home_relative).join(APP_DIR)
    }
}
