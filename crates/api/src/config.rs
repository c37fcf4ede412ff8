//! Process configuration, read once from the environment at startup.

use anyhow::{bail, Context};

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub concurrency_limit: usize,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            concurrency_limit: 5,
            use_persistent_stores: false,
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            defaults.jwt_secret.clone()
        });

        let concurrency_limit = match lookup("BATCH_CONCURRENCY_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("BATCH_CONCURRENCY_LIMIT is not a number: {raw}"))?,
            None => defaults.concurrency_limit,
        };
        if concurrency_limit == 0 {
            bail!("BATCH_CONCURRENCY_LIMIT must be at least 1");
        }

        let use_persistent_stores = lookup("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let database_url = lookup("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            bail!("USE_PERSISTENT_STORES requires DATABASE_URL");
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret,
            concurrency_limit,
            use_persistent_stores,
            database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("BATCH_CONCURRENCY_LIMIT", "8"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.concurrency_limit, 8);
    }

    #[test]
    fn rejects_zero_or_garbage_concurrency() {
        assert!(config(&[("BATCH_CONCURRENCY_LIMIT", "0")]).is_err());
        assert!(config(&[("BATCH_CONCURRENCY_LIMIT", "many")]).is_err());
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        assert!(config(&[("USE_PERSISTENT_STORES", "true")]).is_err());
        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/catalog"),
        ])
        .unwrap();
        assert!(cfg.use_persistent_stores);
    }
}
