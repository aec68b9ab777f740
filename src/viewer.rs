use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{CatalogClient, CatalogError, Episode, EpisodeList, EpisodeServer, EpisodeSource};

const DEFAULT_EPISODE: &str = "1";
const SUB_CATEGORY: &str = "sub";

/// Everything the episode page needs once resolution succeeded.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub anime: Value,
    pub episodes: Vec<Episode>,
    pub current_episode: u32,
    pub embed_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Episode {0} not available.")]
    EpisodeUnavailable(String),
    #[error("No available servers for this episode.")]
    NoServers,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Picks the raw episode value: query override, then a numeric cookie,
/// then the first episode.
pub fn requested_episode<'a>(query: Option<&'a str>, cookie: Option<&'a str>) -> &'a str {
    if let Some(value) = query.map(str::trim).filter(|value| !value.is_empty()) {
        return value;
    }

    match cookie.map(str::trim) {
        Some(value) if value.parse::<i64>().is_ok() => value,
        Some(value) => {
            debug!(cookie = value, "ignoring non-numeric last episode cookie");
            DEFAULT_EPISODE
        }
        None => DEFAULT_EPISODE,
    }
}

/// Validates `raw` against `[1, total_episodes]` and returns the episode at
/// that position.
pub fn select_episode<'a>(list: &'a EpisodeList, raw: &str) -> Result<(u32, &'a Episode), ViewerError> {
    let unavailable = || ViewerError::EpisodeUnavailable(raw.to_string());

    let number = raw.parse::<i64>().map_err(|_| unavailable())?;
    if number < 1 || number > i64::from(list.total_episodes) {
        return Err(unavailable());
    }

    let number = u32::try_from(number).map_err(|_| unavailable())?;
    let episode = list
        .episodes
        .get(number as usize - 1)
        .ok_or_else(unavailable)?;

    Ok((number, episode))
}

/// The preferred server when the catalog lists it, otherwise the first one.
pub fn select_server<'a>(
    servers: &'a [EpisodeServer],
    preferred: Option<&str>,
) -> Option<&'a EpisodeServer> {
    preferred
        .and_then(|name| {
            servers
                .iter()
                .find(|server| server.server_name.eq_ignore_ascii_case(name))
        })
        .or_else(|| servers.first())
}

pub fn select_embed_url(sources: &[EpisodeSource]) -> Option<String> {
    sources.first().map(|source| source.url.clone())
}

/// Resolves the episode to play for `anime_id` and the URL to embed for it.
pub async fn resolve(
    catalog: &CatalogClient,
    preferred_server: Option<&str>,
    anime_id: &str,
    episode_query: Option<&str>,
    episode_cookie: Option<&str>,
) -> Result<Viewer, ViewerError> {
    let anime = catalog.anime_info(anime_id).await?;
    let list = catalog.episodes(anime_id).await?;

    let raw = requested_episode(episode_query, episode_cookie);
    let (current_episode, episode) = select_episode(&list, raw)?;
    let episode_id = episode
        .episode_id
        .as_deref()
        .ok_or_else(|| ViewerError::EpisodeUnavailable(raw.to_string()))?;

    let servers = catalog.episode_servers(episode_id).await?;
    let server = select_server(&servers, preferred_server).ok_or(ViewerError::NoServers)?;

    debug!(
        anime_id,
        episode_id,
        server = %server.server_name,
        server_id = server.server_id,
        "selected sub server"
    );

    let sources = catalog
        .episode_sources(episode_id, &server.server_name, SUB_CATEGORY)
        .await?;
    let embed_url = select_embed_url(&sources);

    if embed_url.is_none() {
        debug!(anime_id, episode_id, "no playable source for episode");
    } else if let Some(source) = sources.first() {
        debug!(anime_id, episode_id, hls = source.is_m3u8, "resolved embed source");
    }

    Ok(Viewer {
        anime,
        episodes: list.episodes,
        current_episode,
        embed_url,
    })
}
