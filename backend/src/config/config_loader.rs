use anyhow::{Context, Result};
use crates::payments::stripe_client::DEFAULT_API_BASE;
use url::Url;

use super::config_model::{
    BackendServer, Database, DotEnvyConfig, Frontend, StaffSecret, Stripe,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_STRIPE_TIMEOUT_SECS: u64 = 30;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        api_base: optional("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        request_timeout_secs: optional("STRIPE_TIMEOUT_SECS")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("STRIPE_TIMEOUT_SECS is invalid")?
            .unwrap_or(DEFAULT_STRIPE_TIMEOUT_SECS),
    };

    let frontend = Frontend {
        base_url: parse_base_url(&required("FRONTEND_URL")?)?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        frontend,
    })
}

pub fn get_staff_secret() -> Result<StaffSecret> {
    dotenvy::dotenv().ok();

    Ok(StaffSecret {
        secret: required("STAFF_JWT_SECRET")?,
    })
}

/// Parses the frontend base URL so that `join("pay/...")` keeps any path prefix.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).context("FRONTEND_URL is invalid")?;
    if url.cannot_be_a_base() {
        anyhow::bail!("FRONTEND_URL cannot be used as a base URL");
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{key} is not set"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
