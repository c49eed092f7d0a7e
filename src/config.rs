use crate::error::{ApiscopeError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_TITLE: &str = "Discovered API";
pub const DEFAULT_VERSION: &str = "0.1.0";
pub const DEFAULT_DESCRIPTION: &str =
    "API description synthesized from observed HTTP traffic. Types are inferred heuristically.";

/// Overrides for the generated document's info block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthesisOptions {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl SynthesisOptions {
    pub fn resolved_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn resolved_version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    pub fn resolved_description(&self) -> &str {
        self.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
    }

    /// Field-wise merge where `other`'s present fields win.
    pub fn overridden_by(&self, other: &SynthesisOptions) -> SynthesisOptions {
        SynthesisOptions {
            title: other.title.clone().or_else(|| self.title.clone()),
            version: other.version.clone().or_else(|| self.version.clone()),
            description: other.description.clone().or_else(|| self.description.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| ApiscopeError::InvalidInput(format!("bad listen address {}: {}", self.host, e)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub synthesis: SynthesisOptions,
    pub server: ServerConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub const DEFAULT_FILE: &'static str = "apiscope.yaml";

    /// Defaults, then the config file (explicit path or `./apiscope.yaml` if present),
    /// then `APISCOPE_*` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
        let config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let local = PathBuf::from(Self::DEFAULT_FILE);
                if local.exists() {
                    Self::load_from(&local)?
                } else {
                    AppConfig::default()
                }
            }
        };
        Self::apply_env(config, |key| std::env::var(key).ok())
    }

    pub fn load_from(path: &Path) -> Result<AppConfig> {
        debug!(path = %path.display(), "loading config file");
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn apply_env<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(title) = lookup("APISCOPE_TITLE") {
            config.synthesis.title = Some(title);
        }
        if let Some(version) = lookup("APISCOPE_VERSION") {
            config.synthesis.version = Some(version);
        }
        if let Some(description) = lookup("APISCOPE_DESCRIPTION") {
            config.synthesis.description = Some(description);
        }
        if let Some(host) = lookup("APISCOPE_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("APISCOPE_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ApiscopeError::InvalidInput(format!("APISCOPE_PORT is not a port: {}", port)))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_resolve() {
        let options = SynthesisOptions::default();
        assert_eq!(options.resolved_title(), DEFAULT_TITLE);
        assert_eq!(options.resolved_version(), DEFAULT_VERSION);
        assert_eq!(options.resolved_description(), DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_override_is_field_wise() {
        let base = SynthesisOptions {
            title: Some("Base".into()),
            version: Some("1.0.0".into()),
            description: None,
        };
        let request = SynthesisOptions {
            title: Some("Request".into()),
            ..Default::default()
        };
        let merged = base.overridden_by(&request);
        assert_eq!(merged.resolved_title(), "Request");
        assert_eq!(merged.resolved_version(), "1.0.0");
        assert_eq!(merged.resolved_description(), DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_env_layer_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "synthesis:\n  title: From File\nserver:\n  port: 9000").unwrap();

        let config = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(config.synthesis.title.as_deref(), Some("From File"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");

        let env: HashMap<&str, &str> = [("APISCOPE_TITLE", "From Env"), ("APISCOPE_PORT", "9100")].into();
        let config = ConfigLoader::apply_env(config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.synthesis.title.as_deref(), Some("From Env"));
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let result = ConfigLoader::apply_env(AppConfig::default(), |k| {
            (k == "APISCOPE_PORT").then(|| "eighty".to_string())
        });
        assert!(matches!(result, Err(ApiscopeError::InvalidInput(_))));
    }

    #[test]
    fn test_socket_addr() {
        let addr = ServerConfig::default().socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }
}
