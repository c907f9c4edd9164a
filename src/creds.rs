//! Credential resolution for connection requests.
//!
//! The tunnel config decides whether credentials are needed at all, the
//! profile metadata decides what kind, and the values come from whichever
//! source answers first: caller-supplied arguments, the macOS Keychain for
//! the per-profile secret, or interactive prompts on the terminal.

use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::profile::Profile;

/// Username the daemon expects for PIN/OTP-only authentication modes.
const PIN_MODE_USERNAME: &str = "pritunl";

#[derive(Error, Debug)]
pub enum CredsError {
    #[error("failed to read tunnel config {}: {source}", path.display())]
    TunnelConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read from terminal: {0}")]
    Prompt(#[from] std::io::Error),

    #[cfg(target_os = "macos")]
    #[error("keychain is locked; run '/usr/bin/security unlock-keychain' and try again")]
    KeychainLocked,

    #[cfg(target_os = "macos")]
    #[error("keychain lookup failed: {0}")]
    Keychain(keyring::Error),

    #[cfg(target_os = "macos")]
    #[error("failed to decode keychain secret: {0}")]
    SecretEncoding(#[from] base64::DecodeError),
}

/// Everything the daemon needs to start a tunnel for one profile.
pub struct ResolvedCredentials {
    pub username: String,
    pub password: String,
    /// The tunnel config blob, with the keychain secret appended when one
    /// exists for this profile.
    pub ovpn: String,
}

/// Resolves the credentials for `profile`, prompting interactively for
/// whatever `user`/`password` did not supply.
pub fn resolve(
    profile: &Profile,
    user: Option<String>,
    password: Option<String>,
) -> Result<ResolvedCredentials, CredsError> {
    let ovpn_path = profile.ovpn_path();
    let ovpn = std::fs::read_to_string(&ovpn_path).map_err(|source| CredsError::TunnelConfig {
        path: ovpn_path,
        source,
    })?;

    let mode = auth_mode(
        needs_credentials(&ovpn),
        profile.conf.password_mode.as_deref(),
    );
    debug!(
        "profile {} auth mode: {}",
        profile.key,
        mode.as_deref().unwrap_or("none")
    );

    #[cfg(target_os = "macos")]
    let ovpn = match keychain_secret(&profile.key)? {
        Some(secret) => format!("{ovpn}\n{secret}"),
        None => ovpn,
    };

    let mut username = user;
    let mut password = password;
    if let Some(mode) = &mode {
        if username.is_none() || password.is_none() {
            if mode.ends_with("otp") || mode.ends_with("pin") {
                username.get_or_insert_with(|| PIN_MODE_USERNAME.to_string());
                if password.is_none() {
                    let pin = rpassword::prompt_password("Enter the PIN: ")?;
                    let otp = if mode == "otp_pin" {
                        prompt_line("Enter the OTP code: ")?
                    } else {
                        String::new()
                    };
                    password = Some(pin + &otp);
                }
            }
            if username.is_none() {
                username = Some(prompt_line("Enter the username: ")?);
            }
            if password.is_none() {
                password = Some(rpassword::prompt_password("Enter the password: ")?);
            }
        }
    }

    Ok(ResolvedCredentials {
        username: username.unwrap_or_default(),
        password: password.unwrap_or_default(),
        ovpn,
    })
}

/// Whether the tunnel config asks for credentials without pointing at an
/// inline credentials file. A bare `auth-user-pass` directive fits in 17
/// characters; anything longer names a file and needs no prompting.
fn needs_credentials(ovpn: &str) -> bool {
    ovpn.lines()
        .map(|line| line.trim_end_matches('\r'))
        .any(|line| line.contains("auth-user-pass") && line.len() <= 17)
}

/// The authentication mode for a profile that needs credentials: its
/// declared `password_mode` when present, the generic `creds` marker
/// otherwise. `None` when no credentials are needed.
fn auth_mode(needs_creds: bool, password_mode: Option<&str>) -> Option<String> {
    if !needs_creds {
        return None;
    }
    match password_mode {
        Some(mode) if !mode.is_empty() => Some(mode.to_string()),
        _ => Some("creds".to_string()),
    }
}

fn prompt_line(label: &str) -> Result<String, std::io::Error> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

/// Looks up the per-profile secret the Pritunl GUI stores in the Keychain
/// (service `pritunl`, account = profile key). The stored value is base64.
#[cfg(target_os = "macos")]
fn keychain_secret(profile_key: &str) -> Result<Option<String>, CredsError> {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    let entry = keyring::Entry::new("pritunl", profile_key).map_err(CredsError::Keychain)?;
    match entry.get_password() {
        Ok(secret) => {
            let decoded = STANDARD.decode(secret.trim())?;
            Ok(Some(String::from_utf8_lossy(&decoded).into_owned()))
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(keyring::Error::NoStorageAccess(_)) => Err(CredsError::KeychainLocked),
        Err(err) => Err(CredsError::Keychain(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_auth_directive_needs_credentials() {
        let ovpn = "client\ndev tun\nauth-user-pass\nremote vpn 1194\n";
        assert!(needs_credentials(ovpn));
    }

    #[test]
    fn auth_directive_with_file_does_not() {
        let ovpn = "client\nauth-user-pass /etc/openvpn/creds.txt\n";
        assert!(!needs_credentials(ovpn));
    }

    #[test]
    fn crlf_line_endings_still_match() {
        let ovpn = "client\r\nauth-user-pass\r\nremote vpn 1194\r\n";
        assert!(needs_credentials(ovpn));
    }

    #[test]
    fn no_auth_directive_means_no_credentials() {
        let ovpn = "client\ndev tun\nremote vpn 1194\n";
        assert!(!needs_credentials(ovpn));
        assert_eq!(auth_mode(false, Some("otp_pin")), None);
    }

    #[test]
    fn declared_password_mode_wins() {
        assert_eq!(auth_mode(true, Some("otp_pin")), Some("otp_pin".to_string()));
        assert_eq!(auth_mode(true, Some("pin")), Some("pin".to_string()));
    }

    #[test]
    fn missing_password_mode_falls_back_to_creds() {
        assert_eq!(auth_mode(true, None), Some("creds".to_string()));
        assert_eq!(auth_mode(true, Some("")), Some("creds".to_string()));
    }
}
