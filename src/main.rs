mod anilist;
mod catalog;
mod config;
mod cookie;
mod http;
mod pages;
#[cfg(test)]
mod test_support;
mod viewer;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::anilist::AniListClient;
use crate::catalog::CatalogClient;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog: CatalogClient,
    pub anilist: AniListClient,
}

pub type SharedAppState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let listen_addr = config.listen_addr;

    let catalog = CatalogClient::new(config.catalog_base_url.clone(), config.catalog_timeout)
        .context("failed to construct anime catalog client")?;

    let anilist = AniListClient::new(config.anilist_url.clone(), config.anilist_timeout)
        .context("failed to construct AniList client")?;

    tracing::debug!(
        catalog = %config.catalog_base_url,
        anilist = %config.anilist_url,
        static_dir = %config.static_dir.display(),
        preferred_server = config.preferred_server.as_deref(),
        "configuration loaded"
    );

    let state = Arc::new(AppState {
        config,
        catalog,
        anilist,
    });
    let app = http::router(state);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {listen_addr}"))?;

    tracing::info!("serving aniview on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().without_time())
        .init();
}
