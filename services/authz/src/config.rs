use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CHECK_API_LIMIT: usize = 100;
pub const DEFAULT_IDENTITY_HEADER: &str = "x-keyward-subject";

const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PG_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_pg_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_pg_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_pg_max_connections() -> u32 {
    DEFAULT_PG_MAX_CONNECTIONS
}

fn default_pg_connect_timeout_ms() -> u64 {
    DEFAULT_PG_CONNECT_TIMEOUT_MS
}

fn default_pg_acquire_timeout_ms() -> u64 {
    DEFAULT_PG_ACQUIRE_TIMEOUT_MS
}

// Authorization service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub check_api_limit: usize,
    pub identity_header: String,
    pub reconcile_interval: Option<Duration>,
    /// User IDs allowed to revoke relations across a whole resource type.
    pub admin_subjects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AuthzConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    postgres: Option<PostgresConfig>,
    check_api_limit: Option<usize>,
    identity_header: Option<String>,
    reconcile_interval_secs: Option<u64>,
    admin_subjects: Option<Vec<String>>,
}

impl AuthzConfig {
    pub fn from_env() -> Result<Self> {
        let metrics_bind = std::env::var("KEYWARD_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse KEYWARD_METRICS_BIND")?;
        let bind_addr = std::env::var("KEYWARD_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .with_context(|| "parse KEYWARD_BIND")?;
        let storage = match std::env::var("KEYWARD_STORAGE") {
            Ok(value) => value.parse().with_context(|| "parse KEYWARD_STORAGE")?,
            Err(_) => StorageBackend::Memory,
        };
        let postgres = match std::env::var("KEYWARD_PG_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_or("KEYWARD_PG_MAX_CONNECTIONS", DEFAULT_PG_MAX_CONNECTIONS)?,
                connect_timeout_ms: env_or(
                    "KEYWARD_PG_CONNECT_TIMEOUT_MS",
                    DEFAULT_PG_CONNECT_TIMEOUT_MS,
                )?,
                acquire_timeout_ms: env_or(
                    "KEYWARD_PG_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                )?,
            }),
            Err(_) => None,
        };
        let check_api_limit = env_or("KEYWARD_CHECK_API_LIMIT", DEFAULT_CHECK_API_LIMIT)?;
        let identity_header = std::env::var("KEYWARD_IDENTITY_HEADER")
            .unwrap_or_else(|_| DEFAULT_IDENTITY_HEADER.to_string());
        let reconcile_interval = std::env::var("KEYWARD_RECONCILE_INTERVAL_SECS")
            .ok()
            .map(|value| {
                value
                    .parse::<u64>()
                    .with_context(|| "parse KEYWARD_RECONCILE_INTERVAL_SECS")
            })
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let admin_subjects = match std::env::var("KEYWARD_ADMIN_SUBJECTS") {
            Ok(value) => parse_admin_subjects(value.split(','))
                .with_context(|| "parse KEYWARD_ADMIN_SUBJECTS")?,
            Err(_) => Vec::new(),
        };
        let config = Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            check_api_limit,
            identity_header,
            reconcile_interval,
            admin_subjects,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("KEYWARD_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read KEYWARD_CONFIG: {path}"))?;
            let override_cfg: AuthzConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse authz config yaml")?;
            config.apply(override_cfg)?;
            config.validate()?;
        }
        Ok(config)
    }

    fn apply(&mut self, override_cfg: AuthzConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value.parse().with_context(|| "parse storage")?;
        }
        if let Some(value) = override_cfg.postgres {
            self.postgres = Some(value);
        }
        if let Some(value) = override_cfg.check_api_limit {
            self.check_api_limit = value;
        }
        if let Some(value) = override_cfg.identity_header {
            self.identity_header = value;
        }
        if let Some(secs) = override_cfg.reconcile_interval_secs {
            self.reconcile_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(subjects) = override_cfg.admin_subjects {
            self.admin_subjects = parse_admin_subjects(subjects.iter().map(String::as_str))
                .with_context(|| "parse admin_subjects")?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.check_api_limit == 0 {
            bail!("check_api_limit must be greater than zero");
        }
        if self.identity_header.trim().is_empty() {
            bail!("identity_header must not be empty");
        }
        if self.storage == StorageBackend::Postgres && self.postgres.is_none() {
            bail!("postgres storage requires KEYWARD_PG_URL or a postgres section");
        }
        Ok(())
    }
}

/// Accepts `user:<id>` or a bare user ID; blanks are skipped.
fn parse_admin_subjects<'a>(values: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    let mut subjects = Vec::new();
    for value in values.map(str::trim).filter(|value| !value.is_empty()) {
        let id = value.strip_prefix("user:").unwrap_or(value);
        if id.is_empty() || id.contains(':') {
            bail!("admin subject must be a user: {value}");
        }
        subjects.push(id.to_string());
    }
    Ok(subjects)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}
