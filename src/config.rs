use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

const DEFAULT_ISSUER_URL: &str = "https://warden.local";
const DEFAULT_MAX_TOKEN_TTL_SECS: u64 = 3600;

// Broker configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Canonical issuer URL embedded in the `iss` claim of issued tokens.
    pub issuer_url: String,
    /// Upper bound on the lifetime of any issued access token, in seconds.
    /// The session's remaining upstream lifetime may shorten it further.
    pub max_token_lifetime_secs: u64,
}

#[derive(Debug, Deserialize)]
struct BrokerConfigOverride {
    issuer_url: Option<String>,
    max_token_lifetime_secs: Option<u64>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            issuer_url: DEFAULT_ISSUER_URL.to_string(),
            max_token_lifetime_secs: DEFAULT_MAX_TOKEN_TTL_SECS,
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self> {
        let issuer_url =
            std::env::var("WARDEN_ISSUER_URL").unwrap_or_else(|_| DEFAULT_ISSUER_URL.to_string());
        let max_token_lifetime_secs = match std::env::var("WARDEN_MAX_TOKEN_TTL_SECS") {
            Ok(value) => value.parse().with_context(|| "parse WARDEN_MAX_TOKEN_TTL_SECS")?,
            Err(_) => DEFAULT_MAX_TOKEN_TTL_SECS,
        };
        Ok(Self {
            issuer_url,
            max_token_lifetime_secs,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read WARDEN_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: BrokerConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse broker config yaml")?;
        if let Some(value) = override_cfg.issuer_url {
            self.issuer_url = value;
        }
        if let Some(value) = override_cfg.max_token_lifetime_secs {
            self.max_token_lifetime_secs = value;
        }
        Ok(())
    }
}
