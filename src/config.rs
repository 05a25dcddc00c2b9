use std::path::Path;

use anyhow::Result;
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub env: String,
    pub structured_logging: bool,
    /// Hard cap on upload size, enforced before any bytes reach storage.
    pub max_upload_bytes: u64,
    /// Seconds to keep serving after a shutdown signal, so load balancers
    /// see the readiness flip before connections stop being accepted.
    pub drain_grace_period_secs: u64,
    /// Upper bound on waiting for in-flight requests once draining ends.
    pub shutdown_timeout_secs: u64,
    pub blob_storage: BlobStorageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            env: "dev".to_string(),
            structured_logging: false,
            max_upload_bytes: 100 * 1024 * 1024,
            drain_grace_period_secs: 15,
            shutdown_timeout_secs: 30,
            blob_storage: BlobStorageConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Layered load: defaults, then the optional YAML file, then
    /// `BLOBGATE_`-prefixed environment variables (nested keys split on
    /// `__`, e.g. `BLOBGATE_BLOB_STORAGE__PATH`).
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));
        if let Some(path) = config_path {
            let yaml = std::fs::read_to_string(path)?;
            figment = figment.merge(Yaml::string(&yaml));
        }
        let config: ServerConfig = figment
            .merge(Env::prefixed("BLOBGATE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen_addr '{}', expected host:port",
                self.listen_addr
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("max_upload_bytes must be greater than zero"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        // Checked in validate(), so this cannot fail after load().
        self.listen_addr
            .parse()
            .unwrap_or_else(|_| std::net::SocketAddr::from(([0, 0, 0, 0], 8080)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(config.max_upload_bytes, 104_857_600);
        assert_eq!(config.drain_grace_period_secs, 15);
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "listen_addr: 127.0.0.1:9090\nmax_upload_bytes: 1024\nblob_storage:\n  path: memory:///\n",
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.blob_storage.path, "memory:///");
        // Untouched keys keep their defaults.
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "listen_addr: not-an-addr\n").unwrap();
        assert!(ServerConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn rejects_zero_upload_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "max_upload_bytes: 0\n").unwrap();
        assert!(ServerConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ServerConfig::load(Some(Path::new("/nonexistent/config.yaml"))).is_err());
    }
}
