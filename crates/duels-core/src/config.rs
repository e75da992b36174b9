//! Application configuration management.
//!
//! Configuration is stored at `~/.config/duels/config.json`. Every field has
//! a default, and `DUELS_API_URL`, `DUELS_RPC_URL` and `DUELS_KEYPAIR`
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::wallet::{TokenMint, USDC_DECIMALS, USDC_MINT};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "duels";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a single wallet prompt (connect, sign, sign-and-send).
const DEFAULT_WALLET_TIMEOUT_SECS: u64 = 120;

pub const ENV_API_URL: &str = "DUELS_API_URL";
pub const ENV_RPC_URL: &str = "DUELS_RPC_URL";
pub const ENV_KEYPAIR: &str = "DUELS_KEYPAIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub rpc_url: String,
    pub usdc_mint: String,
    pub token_decimals: u8,
    pub request_timeout_secs: u64,
    pub wallet_timeout_secs: u64,
    /// Solana CLI keypair file used as the wallet.
    pub keypair_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            usdc_mint: USDC_MINT.to_string(),
            token_decimals: USDC_DECIMALS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            wallet_timeout_secs: DEFAULT_WALLET_TIMEOUT_SECS,
            keypair_path: None,
        }
    }
}

impl Config {
    /// Loads the config file (defaults if absent) and applies environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::read(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Writes the config file, creating its directory.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.write(&path)?;
        Ok(path)
    }

    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(path) = lookup(ENV_KEYPAIR) {
            self.keypair_path = Some(PathBuf::from(path));
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wallet_timeout(&self) -> Duration {
        Duration::from_secs(self.wallet_timeout_secs)
    }

    pub fn token_mint(&self) -> crate::Result<TokenMint> {
        TokenMint::new(&self.usdc_mint, self.token_decimals)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_url":"https://duels.example/api"}"#)
            .expect("Failed to parse config JSON");
        assert_eq!(config.api_url, "https://duels.example/api");
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.wallet_timeout(), Duration::from_secs(120));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.keypair_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_RPC_URL, "http://127.0.0.1:8899"),
            (ENV_KEYPAIR, "/tmp/id.json"),
            (ENV_API_URL, "  "),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.keypair_path, Some(PathBuf::from("/tmp/id.json")));
    }

    #[test]
    fn test_saved_config_reads_back() {
        let dir = std::env::temp_dir().join(format!("duels-config-{}", std::process::id()));
        let path = dir.join("nested").join(CONFIG_FILE);
        let config = Config {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            keypair_path: Some(PathBuf::from("/tmp/id.json")),
            ..Config::default()
        };

        config.write(&path).expect("Failed to write config");
        assert_eq!(Config::read(&path).expect("Failed to read config"), config);

        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(Config::read(&path).expect("missing file"), Config::default());
    }

    #[test]
    fn test_default_mint_is_usdc() {
        let mint = Config::default().token_mint().expect("valid mint");
        assert_eq!(mint.mint.to_string(), USDC_MINT);
        assert_eq!(mint.decimals, 6);

        let broken = Config {
            usdc_mint: "not-base58-0OIl".to_string(),
            ..Config::default()
        };
        assert!(broken.token_mint().is_err());
    }
}
