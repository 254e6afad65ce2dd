use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub cookie_secure: bool,
    /// Seeded on startup when both are set and the account does not exist.
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("WANDER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("WANDER_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = get("WANDER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("WANDER_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("WANDER_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("WANDER_HOST must be an IP address")?;

        let ttl_hours: i64 = match get("WANDER_TOKEN_TTL_HOURS") {
            Some(v) => v.parse().context("WANDER_TOKEN_TTL_HOURS must be a number")?,
            None => 168,
        };
        if ttl_hours <= 0 {
            bail!("WANDER_TOKEN_TTL_HOURS must be positive");
        }

        let cookie_secure = get("WANDER_COOKIE_SECURE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let admin = match (get("WANDER_ADMIN_EMAIL"), get("WANDER_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(Self {
            addr,
            db_path: get("WANDER_DB_PATH").unwrap_or_else(|| "wander.db".into()).into(),
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            cookie_secure,
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("WANDER_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.db_path, PathBuf::from("wander.db"));
        assert_eq!(config.token_ttl, chrono::Duration::days(7));
        assert!(!config.cookie_secure);
        assert!(config.admin.is_none());
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(load(&[]).is_err());
        assert!(load(&[("WANDER_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("WANDER_JWT_SECRET", "s3cr3t-value"),
            ("WANDER_HOST", "127.0.0.1"),
            ("WANDER_PORT", "8080"),
            ("WANDER_TOKEN_TTL_HOURS", "2"),
            ("WANDER_COOKIE_SECURE", "true"),
            ("WANDER_ADMIN_EMAIL", "root@wander.test"),
            ("WANDER_ADMIN_PASSWORD", "long enough"),
        ])
        .unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.token_ttl, chrono::Duration::hours(2));
        assert!(config.cookie_secure);
        assert_eq!(config.admin.unwrap().0, "root@wander.test");
    }

    #[test]
    fn bad_numbers_fail() {
        assert!(load(&[("WANDER_JWT_SECRET", "x1"), ("WANDER_PORT", "http")]).is_err());
        assert!(load(&[("WANDER_JWT_SECRET", "x1"), ("WANDER_TOKEN_TTL_HOURS", "0")]).is_err());
    }
}
