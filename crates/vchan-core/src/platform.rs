use std::path::PathBuf;

/// Directory name used under the per-user config and data roots.
const APP_DIR: &str = "vchan";

/// Environment override for the config directory. Handy for running several
/// daemons side by side or pointing tests at a scratch directory.
pub const CONFIG_DIR_ENV: &str = "VCHAN_CONFIG_DIR";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/vchan/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        // Portable install: a `data` folder next to the executable wins
        if let Some(dir) = beside_exe("data") {
            return dir;
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    #[cfg(windows)]
    {
        if let Some(config) = beside_exe("config.toml") {
            if let Some(parent) = config.parent() {
                return parent.to_path_buf();
            }
        }
    }

    // On macOS and Linux, always use ~/.config/vchan/
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

#[cfg(windows)]
fn beside_exe(name: &str) -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let candidate = exe_path.parent()?.join(name);
    candidate.exists().then_some(candidate)
}
