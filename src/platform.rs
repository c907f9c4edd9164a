//! OS-specific locations for the Pritunl daemon and its profile store.

use std::path::PathBuf;

/// Control API socket used by the daemon on macOS and Linux.
#[cfg(unix)]
pub const SOCKET_PATH: &str = "/var/run/pritunl.sock";

/// Loopback control API endpoint where Unix sockets are unavailable.
#[cfg(not(unix))]
pub const BASE_URL: &str = "http://localhost:9770/";

/// Directory holding paired `<id>.conf` / `<id>.ovpn` profile files.
///
/// Resolves to `~/Library/Application Support/pritunl/profiles` on macOS,
/// `~/.config/pritunl/profiles` on Linux and `%APPDATA%\pritunl\profiles`
/// on Windows. `None` when the home directory cannot be determined.
pub fn profile_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("pritunl").join("profiles"))
}

/// File the daemon writes its control API auth key to.
pub fn auth_key_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\ProgramData\Pritunl\auth")
    } else {
        PathBuf::from("/var/run/pritunl.auth")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_dir_is_under_pritunl() {
        if let Some(dir) = profile_dir() {
            assert!(dir.ends_with("pritunl/profiles"));
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn auth_key_path_on_posix() {
        assert_eq!(auth_key_path(), PathBuf::from("/var/run/pritunl.auth"));
    }
}
