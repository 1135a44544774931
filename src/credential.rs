//! API credential resolution
//!
//! The key comes from the process environment. Debug builds may also read it
//! from an IDE launch configuration (`.vscode/launch.json`), first entry only.

use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Environment variable holding the API key
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Launch configuration consulted when the env var is unset
pub const DEFAULT_LAUNCH_CONFIG_PATH: &str = ".vscode/launch.json";

/// Number of leading characters shown in diagnostics
const REDACTED_PREFIX_LEN: usize = 7;

/// Where to look for the credential
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Environment variable name
    pub env_var: String,

    /// Launch configuration path, `None` disables the fallback
    pub launch_config: Option<PathBuf>,
}

/// Which source supplied the credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Process environment (including `.env`)
    Environment,
    /// IDE launch configuration file
    LaunchConfig(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::LaunchConfig(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Credential could not be resolved from any source
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Neither the environment nor the fallback file yielded a key
    #[error("API key not found; set the {env_var} environment variable{detail}")]
    Missing {
        /// Variable that was checked
        env_var: String,
        /// Why the fallback did not help, prefixed with "; "
        detail: String,
    },
}

/// An API key, redacted in `Debug` output
pub struct Credential {
    secret: SecretString,
    source: CredentialSource,
}

impl Credential {
    /// Wrap a key obtained elsewhere
    #[must_use]
    pub fn new(key: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            secret: SecretString::from(key.into()),
            source,
        }
    }

    /// Raw key for building an `Authorization` header
    #[must_use]
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Source that supplied this key
    #[must_use]
    pub const fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// First few characters followed by an ellipsis
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.expose().chars().take(REDACTED_PREFIX_LEN).collect();
        format!("{prefix}...")
    }

    /// Whether the key has the usual `sk-` shape
    #[must_use]
    pub fn looks_valid(&self) -> bool {
        self.expose().starts_with("sk-")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.redacted())
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Deserialize)]
struct LaunchConfig {
    configurations: Vec<LaunchConfiguration>,
}

#[derive(Deserialize)]
struct LaunchConfiguration {
    #[serde(default)]
    env: std::collections::HashMap<String, String>,
}

/// Load the credential from the process environment and configured fallback
///
/// # Errors
///
/// Returns [`CredentialError::Missing`] if no source yields a non-empty key
pub fn load_credential(config: &CredentialConfig) -> Result<Credential, CredentialError> {
    resolve_credential(
        &config.env_var,
        std::env::var(&config.env_var).ok(),
        config.launch_config.as_deref(),
    )
}

/// Resolve the credential from an env value and an optional launch file
///
/// # Errors
///
/// Returns [`CredentialError::Missing`] if no source yields a non-empty key
pub fn resolve_credential(
    env_var: &str,
    env_value: Option<String>,
    launch_config: Option<&Path>,
) -> Result<Credential, CredentialError> {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        return Ok(announce(Credential::new(key, CredentialSource::Environment)));
    }

    tracing::warn!(env_var, "API key not found in environment");

    let Some(path) = launch_config else {
        return Err(CredentialError::Missing {
            env_var: env_var.to_string(),
            detail: String::new(),
        });
    };

    match read_launch_config(path, env_var) {
        Ok(key) => Ok(announce(Credential::new(
            key,
            CredentialSource::LaunchConfig(path.to_path_buf()),
        ))),
        Err(reason) => {
            tracing::warn!(path = %path.display(), %reason, "could not load key from launch config");
            Err(CredentialError::Missing {
                env_var: env_var.to_string(),
                detail: format!("; {}: {reason}", path.display()),
            })
        }
    }
}

/// Extract `configurations[0].env.<env_var>` from a launch file
fn read_launch_config(path: &Path, env_var: &str) -> Result<String, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let launch: LaunchConfig = serde_json::from_str(&content).map_err(|e| e.to_string())?;

    launch
        .configurations
        .into_iter()
        .next()
        .ok_or_else(|| "no configurations".to_string())?
        .env
        .remove(env_var)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| format!("{env_var} not set in first configuration"))
}

fn announce(credential: Credential) -> Credential {
    tracing::info!(
        source = %credential.source(),
        key = %credential.redacted(),
        "API key found"
    );
    if !credential.looks_valid() {
        tracing::warn!("API key format appears incorrect (expected \"sk-\" prefix)");
    }
    credential
}
