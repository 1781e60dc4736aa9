use std::path::PathBuf;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "SIGNAGE_CONFIG_DIR";

/// System-wide config directory, used when no env override is set.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc/signage")
}

/// Per-user fallback config directory: ~/.config/signage/
pub fn user_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("signage")
}

/// Data directory for logs and the cached waiting image: ~/.local/share/signage/
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("signage")
}

/// Default location of the waiting-screen placeholder image.
pub fn waiting_image_path() -> PathBuf {
    data_dir().join("waiting.png")
}

/// Find the mpv binary on PATH. Returns None when mpv is not installed.
pub fn find_mpv_binary() -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    for dir in path.split(':') {
        let candidate = PathBuf::from(dir).join("mpv");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
