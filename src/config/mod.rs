use std::collections::HashMap;
use std::net::IpAddr;

use anyhow::{Context, Result};
use tracing::warn;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub webhook: WebhookConfig,
    pub retention_days: i64,
    pub token_ttl_minutes: i64,
    pub owner_refs: HashMap<String, Uuid>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub signing_secret: String,
    pub basic_user: Option<String>,
    pub basic_password: Option<String>,
    pub allowed_ips: Vec<IpAddr>,
    /// Explicit opt-in for senders that cannot compute signatures. Never a
    /// deployment-name heuristic; off unless set in the environment.
    pub allow_unsigned: bool,
    pub timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let host = env_or("MAILROOM_HOST", "0.0.0.0");
        let port: u16 = env_or("MAILROOM_PORT", "8080")
            .parse()
            .context("MAILROOM_PORT is not a valid port")?;

        let signing_secret =
            std::env::var("MAILROOM_WEBHOOK_SECRET").context("MAILROOM_WEBHOOK_SECRET is not set")?;

        let (basic_user, basic_password) = match std::env::var("MAILROOM_WEBHOOK_BASIC") {
            Ok(cred) => {
                let (user, pass) = cred
                    .split_once(':')
                    .context("MAILROOM_WEBHOOK_BASIC must be user:password")?;
                (Some(user.to_string()), Some(pass.to_string()))
            }
            Err(_) => (None, None),
        };

        let allowed_ips = parse_ip_list(&env_or("MAILROOM_WEBHOOK_ALLOWED_IPS", ""))?;
        if allowed_ips.is_empty() {
            warn!("webhook IP allowlist is empty; every source address will be accepted");
        }

        let allow_unsigned = env_bool("MAILROOM_WEBHOOK_ALLOW_UNSIGNED");
        if allow_unsigned {
            warn!("MAILROOM_WEBHOOK_ALLOW_UNSIGNED is enabled: webhook events without a signature header will be accepted");
        }

        let retention_days: i64 = env_or("MAILROOM_RETENTION_DAYS", "30")
            .parse()
            .context("MAILROOM_RETENTION_DAYS is not a number")?;
        let token_ttl_minutes: i64 = env_or("MAILROOM_TOKEN_TTL_MINUTES", "15")
            .parse()
            .context("MAILROOM_TOKEN_TTL_MINUTES is not a number")?;
        let timeout_seconds: u64 = env_or("MAILROOM_WEBHOOK_TIMEOUT_SECONDS", "10")
            .parse()
            .context("MAILROOM_WEBHOOK_TIMEOUT_SECONDS is not a number")?;

        let owner_refs = parse_owner_refs(&env_or("MAILROOM_OWNER_REFS", ""))?;

        Ok(Self {
            server: ServerConfig { host, port },
            database_url,
            webhook: WebhookConfig {
                signing_secret,
                basic_user,
                basic_password,
                allowed_ips,
                allow_unsigned,
                timeout_seconds,
            },
            retention_days,
            token_ttl_minutes,
            owner_refs,
        })
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .with_context(|| format!("invalid IP address in allowlist: {s}"))
        })
        .collect()
}

/// `ref=uuid,ref=uuid` pairs mapping the provider's owner references to
/// account ids. Account management itself lives outside this service.
fn parse_owner_refs(raw: &str) -> Result<HashMap<String, Uuid>> {
    let mut map = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (external_ref, id) = pair
            .split_once('=')
            .with_context(|| format!("invalid owner ref mapping: {pair}"))?;
        let id = id
            .parse::<Uuid>()
            .with_context(|| format!("invalid owner id in mapping: {pair}"))?;
        map.insert(external_ref.to_string(), id);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_list() {
        let ips = parse_ip_list("10.0.0.1, 192.168.1.20").unwrap();
        assert_eq!(ips.len(), 2);
        assert!(parse_ip_list("").unwrap().is_empty());
        assert!(parse_ip_list("not-an-ip").is_err());
    }

    #[test]
    fn test_parse_owner_refs() {
        let id = Uuid::new_v4();
        let map = parse_owner_refs(&format!("acme={id}")).unwrap();
        assert_eq!(map.get("acme"), Some(&id));
        assert!(parse_owner_refs("missing-equals").is_err());
        assert!(parse_owner_refs("").unwrap().is_empty());
    }
}
