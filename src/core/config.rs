use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_PORT: u16 = 17890;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub coordination: CoordinationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Deadline for a single step, in seconds.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Six-field cron expression for the periodic sweep. No sweep is
    /// scheduled when unset.
    #[serde(default)]
    pub sweep_cron: Option<String>,

    /// Resolve the branch head with `git ls-remote` during the clone step.
    #[serde(default)]
    pub git_probe: bool,

    /// Fixed RNG seed for the simulated steps.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_coordination_timeout")]
    pub timeout_secs: u64,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}
fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_step_timeout() -> u64 {
    300
}
fn default_coordination_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_port: default_api_port(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
            sweep_cron: None,
            git_probe: false,
            seed: None,
        }
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_coordination_timeout(),
        }
    }
}

impl WorkflowConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }
}

impl CoordinationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// `$QAFLOW_DATA_DIR`, or `~/.qaflow`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("QAFLOW_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".qaflow")
}

impl AppConfig {
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join("config.toml");
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            info!("No config.toml found, using defaults.");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());

        info!(
            "Loaded config: api={}:{}, step_timeout={}s, sweep_cron={:?}, coordination={}",
            config.server.api_host,
            config.server.api_port,
            config.workflow.step_timeout_secs,
            config.workflow.sweep_cron,
            config.coordination.url.as_deref().unwrap_or("unset")
        );
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("QAFLOW_COORDINATION_URL").filter(|v| !v.trim().is_empty()) {
            self.coordination.url = Some(url);
        }
        if let Some(key) = lookup("QAFLOW_COORDINATION_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.coordination.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.server.api_port, DEFAULT_API_PORT);
        assert_eq!(config.workflow.step_timeout_secs, 300);
        assert!(config.workflow.sweep_cron.is_none());
        assert_eq!(config.coordination.timeout_secs, 30);
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            "[workflow]\nstep_timeout_secs = 20\nsweep_cron = \"0 */5 * * * *\"\n\n[coordination]\nurl = \"http://coord.local/register\"\n",
        )
        .await
        .unwrap();
        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.workflow.step_timeout(), Duration::from_secs(20));
        assert_eq!(config.workflow.sweep_cron.as_deref(), Some("0 */5 * * * *"));
        assert!(!config.workflow.git_probe);
        assert_eq!(config.server.api_host, DEFAULT_API_HOST);
        assert!(config.coordination.url.is_some());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("config.toml"), "[workflow\n")
            .await
            .unwrap();
        assert!(AppConfig::load(dir.path()).await.is_err());
    }

    #[test]
    fn env_overrides_coordination() {
        let env: HashMap<&str, &str> = [
            ("QAFLOW_COORDINATION_URL", "http://override/register"),
            ("QAFLOW_COORDINATION_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(
            config.coordination.url.as_deref(),
            Some("http://override/register")
        );
        assert_eq!(config.coordination.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn zero_timeouts_are_clamped() {
        let mut config = AppConfig::default();
        config.workflow.step_timeout_secs = 0;
        config.coordination.timeout_secs = 0;
        assert_eq!(config.workflow.step_timeout(), Duration::from_secs(1));
        assert_eq!(config.coordination.timeout(), Duration::from_secs(1));
    }
}
