use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use reqwest::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub catalog_base_url: Url,
    pub catalog_timeout: Duration,
    pub anilist_url: Url,
    pub anilist_timeout: Duration,
    pub static_dir: PathBuf,
    pub site_title: String,
    pub preferred_server: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("ANIVIEW_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("ANIVIEW_PORT").unwrap_or_else(|| "5000".to_string());
        let port = port
            .parse::<u16>()
            .context("ANIVIEW_PORT must be a valid u16 integer")?;
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .context("failed to parse socket address from ANIVIEW_HOST and ANIVIEW_PORT")?;

        let raw_catalog_url = lookup("ANIVIEW_CATALOG_BASE_URL")
            .unwrap_or_else(|| "https://aniwatchv2.vercel.app/api/v2/hianime/".to_string());
        let catalog_base_url = parse_root_url(&raw_catalog_url, "ANIVIEW_CATALOG_BASE_URL")?;

        let raw_anilist_url = lookup("ANIVIEW_ANILIST_URL")
            .unwrap_or_else(|| "https://graphql.anilist.co".to_string());
        let anilist_url = Url::parse(raw_anilist_url.trim())
            .context("ANIVIEW_ANILIST_URL must be a valid URL")?;

        let timeout_secs = lookup("ANIVIEW_CATALOG_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(10);
        let catalog_timeout = Duration::from_secs(timeout_secs);

        let anilist_timeout_secs = lookup("ANIVIEW_ANILIST_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(timeout_secs);
        let anilist_timeout = Duration::from_secs(anilist_timeout_secs);

        let static_dir = lookup("ANIVIEW_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static"));

        let site_title = lookup("ANIVIEW_TITLE").unwrap_or_else(|| "AniView".to_string());

        let preferred_server = lookup("ANIVIEW_PREFERRED_SERVER")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            listen_addr,
            catalog_base_url,
            catalog_timeout,
            anilist_url,
            anilist_timeout,
            static_dir,
            site_title,
            preferred_server,
        })
    }
}

fn parse_root_url(value: &str, label: &str) -> Result<Url> {
    let mut normalized = value.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).with_context(|| format!("{label} must be a valid URL"))
}
