//! Cross-platform path and host platform resolution.

use std::path::PathBuf;

/// Returns the default cache directory for fleetscan.
///
/// Platform-specific locations:
/// - Linux: `~/.cache/fleetscan/`
/// - macOS: `~/Library/Caches/fleetscan/`
/// - Windows: `%LOCALAPPDATA%\fleetscan\cache\`
///
/// Falls back to `./.fleetscan-cache` when no cache directory is known.
pub fn cache_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir()
            .map(|d| d.join("fleetscan").join("cache"))
            .unwrap_or_else(|| PathBuf::from(".fleetscan-cache"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("fleetscan"))
            .unwrap_or_else(|| PathBuf::from(".fleetscan-cache"))
    }
}

/// Returns the configuration directory for fleetscan.
///
/// - Linux: `~/.config/fleetscan/`
/// - macOS: `~/Library/Application Support/fleetscan/`
/// - Windows: `%APPDATA%\fleetscan\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleetscan")
}

/// Host platform in `os/arch` form, using container platform naming.
pub fn host_platform() -> String {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        other => other,
    };
    format!("{}/{}", std::env::consts::OS, arch)
}
