use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use serde_with::{DefaultOnNull, serde_as};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Url,
}

impl CatalogClient {
    pub fn new(base_url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("aniview/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub async fn home(&self) -> Result<Value, CatalogError> {
        let url = self.endpoint(&["home"])?;
        let payload: Envelope<Value> = self.get_json(url).await?;

        Ok(payload.data.unwrap_or_else(empty_object))
    }

    pub async fn search_suggestions(&self, query: &str) -> Result<Vec<Suggestion>, CatalogError> {
        let mut url = self.endpoint(&["search", "suggestion"])?;
        url.query_pairs_mut().append_pair("q", query);

        let payload: Envelope<SuggestionData> = self.get_json(url).await?;
        let suggestions = payload.data.map(|data| data.suggestions).unwrap_or_default();

        debug!(
            query,
            suggestions = suggestions.len(),
            "catalog suggestions received"
        );

        Ok(suggestions)
    }

    pub async fn anime_info(&self, anime_id: &str) -> Result<Value, CatalogError> {
        let url = self.endpoint(&["anime", anime_id])?;
        let payload: Envelope<AnimeInfoData> = self.get_json(url).await?;

        Ok(payload
            .data
            .and_then(|data| data.anime)
            .unwrap_or_else(empty_object))
    }

    pub async fn episodes(&self, anime_id: &str) -> Result<EpisodeList, CatalogError> {
        let url = self.endpoint(&["anime", anime_id, "episodes"])?;
        let payload: Envelope<EpisodeList> = self.get_json(url).await?;
        let list = payload.data.unwrap_or_default();

        debug!(
            anime_id,
            total = list.total_episodes,
            listed = list.episodes.len(),
            "catalog episode list received"
        );

        Ok(list)
    }

    pub async fn episode_servers(
        &self,
        episode_id: &str,
    ) -> Result<Vec<EpisodeServer>, CatalogError> {
        let mut url = self.endpoint(&["episode", "servers"])?;
        url.query_pairs_mut()
            .append_pair("animeEpisodeId", episode_id);

        let payload: Envelope<ServerData> = self.get_json(url).await?;
        let servers = payload.data.map(|data| data.sub).unwrap_or_default();

        debug!(
            episode_id,
            sub_servers = servers.len(),
            "catalog server list received"
        );

        Ok(servers)
    }

    pub async fn episode_sources(
        &self,
        episode_id: &str,
        server: &str,
        category: &str,
    ) -> Result<Vec<EpisodeSource>, CatalogError> {
        let mut url = self.endpoint(&["episode", "sources"])?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("animeEpisodeId", episode_id);
            pairs.append_pair("server", server);
            pairs.append_pair("category", category);
        }

        let payload: Envelope<SourceData> = self.get_json(url).await?;
        let sources = payload.data.map(|data| data.sources).unwrap_or_default();

        debug!(
            episode_id,
            server,
            category,
            sources = sources.len(),
            "catalog source list received"
        );

        Ok(sources)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        debug!(url = %url, "requesting catalog endpoint");

        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct SuggestionData {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Suggestion {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnimeInfoData {
    #[serde(default)]
    anime: Option<Value>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodeList {
    #[serde(rename = "totalEpisodes")]
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub total_episodes: u32,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "episodeId")]
    #[serde(default)]
    pub episode_id: Option<String>,
    #[serde(rename = "isFiller")]
    #[serde(default)]
    pub is_filler: bool,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct ServerData {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    sub: Vec<EpisodeServer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeServer {
    #[serde(rename = "serverId")]
    #[serde(default)]
    pub server_id: Option<i64>,
    #[serde(rename = "serverName")]
    pub server_name: String,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct SourceData {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    sources: Vec<EpisodeSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeSource {
    pub url: String,
    #[serde(rename = "isM3U8")]
    #[serde(default)]
    pub is_m3u8: bool,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog base url `{0}` cannot carry path segments")]
    BaseUrl(String),
    #[error("HTTP error when querying the anime catalog")]
    Http(#[from] reqwest::Error),
    #[error("failed to deserialise anime catalog response payload")]
    Deserialisation(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
    };
    use serde_json::json;

    use super::*;
    use crate::test_support::spawn_upstream;

    fn client(base_url: Url) -> CatalogClient {
        CatalogClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn episode_list_tolerates_missing_and_null_fields() {
        let router = Router::new().route(
            "/api/anime/{id}/episodes",
            get(|Path(id): Path<String>| async move {
                assert_eq!(id, "frieren-18542");
                Json(json!({
                    "status": 200,
                    "data": {
                        "totalEpisodes": 2,
                        "episodes": [
                            { "number": 1, "title": "The Journey's End", "episodeId": "frieren-18542?ep=107257", "isFiller": false },
                            { "number": 2, "title": null }
                        ]
                    }
                }))
            }),
        );
        let base = spawn_upstream(router).await.join("api/").unwrap();

        let list = client(base).episodes("frieren-18542").await.unwrap();

        assert_eq!(list.total_episodes, 2);
        assert_eq!(list.episodes.len(), 2);
        assert_eq!(
            list.episodes[0].episode_id.as_deref(),
            Some("frieren-18542?ep=107257")
        );
        assert!(list.episodes[1].episode_id.is_none());
        assert!(list.episodes[1].title.is_none());
    }

    #[tokio::test]
    async fn absent_data_yields_empty_collections() {
        let router = Router::new()
            .route(
                "/anime/{id}/episodes",
                get(|| async { Json(json!({ "status": 200 })) }),
            )
            .route(
                "/episode/servers",
                get(|| async { Json(json!({ "status": 200, "data": { "sub": null } })) }),
            )
            .route("/home", get(|| async { Json(json!({})) }));
        let catalog = client(spawn_upstream(router).await);

        let list = catalog.episodes("missing").await.unwrap();
        assert_eq!(list.total_episodes, 0);
        assert!(list.episodes.is_empty());

        let servers = catalog.episode_servers("missing?ep=1").await.unwrap();
        assert!(servers.is_empty());

        let home = catalog.home().await.unwrap();
        assert_eq!(home, json!({}));
    }

    #[tokio::test]
    async fn query_parameters_are_forwarded() {
        let router = Router::new()
            .route(
                "/search/suggestion",
                get(|Query(params): Query<std::collections::HashMap<String, String>>| async move {
                    assert_eq!(params.get("q").map(String::as_str), Some("one piece"));
                    Json(json!({
                        "data": { "suggestions": [ { "id": "one-piece-100", "name": "One Piece" } ] }
                    }))
                }),
            )
            .route(
                "/episode/sources",
                get(|Query(params): Query<std::collections::HashMap<String, String>>| async move {
                    assert_eq!(
                        params.get("animeEpisodeId").map(String::as_str),
                        Some("one-piece-100?ep=2142")
                    );
                    assert_eq!(params.get("server").map(String::as_str), Some("hd-1"));
                    assert_eq!(params.get("category").map(String::as_str), Some("sub"));
                    Json(json!({
                        "data": { "sources": [ { "url": "https://cdn.example/master.m3u8", "isM3U8": true } ] }
                    }))
                }),
            );
        let catalog = client(spawn_upstream(router).await);

        let suggestions = catalog.search_suggestions("one piece").await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, "one-piece-100");

        let sources = catalog
            .episode_sources("one-piece-100?ep=2142", "hd-1", "sub")
            .await
            .unwrap();
        assert_eq!(sources[0].url, "https://cdn.example/master.m3u8");
        assert!(sources[0].is_m3u8);
    }

    #[tokio::test]
    async fn anime_identifier_is_a_single_path_segment() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/anime/{id}",
            get(move |Path(id): Path<String>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "data": { "anime": { "info": { "id": id } } } }))
                }
            }),
        );
        let catalog = client(spawn_upstream(router).await);

        let info = catalog.anime_info("odd/id?x").await.unwrap();

        assert_eq!(info["info"]["id"], "odd/id?x");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_failure_status_is_an_error() {
        let router = Router::new().route(
            "/home",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let catalog = client(spawn_upstream(router).await);

        let err = catalog.home().await.unwrap_err();
        assert!(matches!(err, CatalogError::Http(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_deserialisation_error() {
        let router = Router::new().route("/home", get(|| async { "<html>" }));
        let catalog = client(spawn_upstream(router).await);

        let err = catalog.home().await.unwrap_err();
        assert!(matches!(err, CatalogError::Deserialisation(_)));
    }
}
