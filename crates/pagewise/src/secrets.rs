//! API key resolution.
//!
//! The inference key may be given in three ways, tried in this order:
//!
//! 1. **Direct value** in the config file (`apiKey`), handy for local runs
//! 2. **File reference** (`apiKeyFile`), e.g. a mounted Docker secret
//! 3. **Environment variable** (`apiKeyEnvVar`, `GEMINI_API_KEY` by default)

use std::path::PathBuf;

use secrecy::SecretString;

use crate::config::InferenceSettings;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set apiKey, apiKeyFile or the {env_var} environment variable)")]
    NotConfigured { env_var: String },

    #[error("Failed to read API key from '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves the inference API key for `settings`.
pub fn resolve_api_key(settings: &InferenceSettings) -> Result<SecretString> {
    resolve_secret(
        settings.api_key.as_deref(),
        settings.api_key_file.as_deref(),
        &settings.api_key_env_var,
    )
}

/// Tries a direct value, then a file, then an environment variable.
/// Empty values count as absent.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: &str,
) -> Result<SecretString> {
    if let Some(value) = direct.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path).map_err(|source| SecretError::FileRead {
            path: path.clone(),
            source,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile(path));
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim().to_string())),
        Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::NotConfigured {
            env_var: env_var.to_string(),
        }),
        Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
            name: env_var.to_string(),
        }),
    }
}

/// Expands a leading `~` to the home directory. `~user/...` is not supported.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return match path.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => home,
            };
        }
    }
    PathBuf::from(path)
}
