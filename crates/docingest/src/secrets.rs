//! API credential resolution.
//!
//! The partitioning API key and the dataset API key are each described by a
//! [`SecretSource`] with three slots, checked in this order:
//!
//! 1. `apiKey`: the key itself, written into the config file
//! 2. `apiKeyFile`: a file holding the key (Docker/Kubernetes secrets)
//! 3. `apiKeyEnvVar`: the name of an environment variable holding the key

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set apiKey, apiKeyFile or apiKeyEnvVar)")]
    Missing,

    #[error("Failed to read API key file '{}': {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key variable '{name}' is not set")]
    EnvVarMissing { name: String },

    #[error("API key variable '{name}' is not valid UTF-8")]
    EnvVarInvalid { name: String },
}

/// Where a credential may be found. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSource {
    pub value: Option<String>,
    pub file: Option<String>,
    pub env_var: Option<String>,
}

fn non_empty(slot: &Option<String>) -> Option<&str> {
    slot.as_deref().filter(|s| !s.is_empty())
}

impl SecretSource {
    pub fn from_env_var(name: &str) -> Self {
        Self {
            env_var: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        non_empty(&self.value).is_some()
            || non_empty(&self.file).is_some()
            || non_empty(&self.env_var).is_some()
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        self.resolve_with(|name| std::env::var(name))
    }

    /// Resolves against `lookup` instead of the process environment. File
    /// and variable contents are trimmed.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<SecretString, SecretError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Some(value) = non_empty(&self.value) {
            return Ok(SecretString::from(value));
        }

        if let Some(file) = non_empty(&self.file) {
            let path = expand_home(file);
            let content = std::fs::read_to_string(&path)
                .map_err(|source| SecretError::ReadFile { path, source })?;
            return Ok(SecretString::from(content.trim()));
        }

        if let Some(name) = non_empty(&self.env_var) {
            return match lookup(name) {
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarMissing {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarInvalid {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::Missing)
    }

    /// Like [`resolve`](Self::resolve), but an absent credential is `None`.
    ///
    /// An unset environment variable counts as absent: the default configs
    /// always name one, and the partitioning key itself is optional.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::Missing) | Err(SecretError::EnvVarMissing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// `~/x` to `$HOME/x`. Other paths are returned unchanged.
fn expand_home(path: &str) -> PathBuf {
    let home = || std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    match path.strip_prefix("~/") {
        Some(rest) => match home() {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(path),
        },
        None if path == "~" => home()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
