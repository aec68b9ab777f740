use std::{borrow::Cow, io::ErrorKind};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::anilist::AniListError;
use crate::catalog::CatalogError;
use crate::cookie;
use crate::pages::{self, RenderError, SiteMeta, StaticPage};
use crate::viewer::{self, ViewerError};
use crate::{AppState, SharedAppState};

const NO_ANIME_FOUND: &str = "No anime found.";
const ANIME_NOT_FOUND: &str = "Anime not found.";

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health))
        .route("/search", get(search_handler))
        .route("/details/{name}", get(details_handler))
        .route("/anime/{anime_id}", get(anime_handler))
        .route("/favicon.ico", get(favicon_handler))
        .route("/contact-us", get(contact_us))
        .route("/version", get(version))
        .route("/about", get(about))
        .route("/privacy-policy", get(privacy_policy))
        .route("/terms-of-service", get(terms_of_service))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn site_meta(state: &AppState) -> SiteMeta {
    SiteMeta {
        title: state.config.site_title.clone(),
    }
}

async fn home_handler(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    info!("home feed requested");

    let feed = state.catalog.home().await?;
    let html = pages::render_home(&site_meta(&state), &feed)?;
    Ok(Html(html).into_response())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct SearchQuery {
    query: Option<String>,
}

async fn search_handler(
    State(state): State<SharedAppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Response, HttpError> {
    let Some(query) = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        debug!("empty search query; redirecting home");
        return Ok(Redirect::to("/").into_response());
    };

    info!(query, "search requested");

    let suggestions = state.catalog.search_suggestions(query).await?;
    let Some(first) = suggestions.first() else {
        info!(query, "search returned no suggestions");
        return Err(HttpError::NotFound(NO_ANIME_FOUND));
    };

    debug!(
        query,
        anime_id = %first.id,
        name = first.name.as_deref(),
        "redirecting to first suggestion"
    );

    Ok(Redirect::to(&pages::anime_href(&first.id)).into_response())
}

async fn details_handler(
    State(state): State<SharedAppState>,
    Path(name): Path<String>,
) -> Result<Response, HttpError> {
    info!(name = %name, "AniList details requested");

    let Some(details) = state.anilist.fetch_details(&name).await? else {
        return Err(HttpError::NotFound(ANIME_NOT_FOUND));
    };

    let html = pages::render_details(&site_meta(&state), &details)?;
    Ok(Html(html).into_response())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct EpisodeQuery {
    episode: Option<String>,
}

async fn anime_handler(
    State(state): State<SharedAppState>,
    Path(anime_id): Path<String>,
    Query(params): Query<EpisodeQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let last_episode = cookie::read_last_episode(&headers, &anime_id);

    info!(
        anime_id = %anime_id,
        episode = params.episode.as_deref(),
        cookie = last_episode.as_deref(),
        "episode viewer requested"
    );

    let viewer = viewer::resolve(
        &state.catalog,
        state.config.preferred_server.as_deref(),
        &anime_id,
        params.episode.as_deref(),
        last_episode.as_deref(),
    )
    .await?;

    let html = pages::render_anime(&site_meta(&state), &anime_id, &viewer)?;
    let mut response = Html(html).into_response();

    match cookie::last_episode_cookie(&anime_id, viewer.current_episode, OffsetDateTime::now_utc())
    {
        Some(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        None => warn!(
            anime_id = %anime_id,
            "identifier is not a valid cookie name; last episode not remembered"
        ),
    }

    Ok(response)
}

async fn favicon_handler(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    let path = state.config.static_dir.join("favicon.ico");

    match fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/x-icon")], bytes).into_response()),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "favicon not present");
            Err(HttpError::NotFound("Not found."))
        }
        Err(error) => Err(HttpError::StaticAsset(error)),
    }
}

fn render_static_page(state: &AppState, page: StaticPage) -> Result<Response, HttpError> {
    debug!(page = page.path(), "static page requested");

    let html = pages::render_static(&site_meta(state), page)?;
    Ok(Html(html).into_response())
}

async fn contact_us(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    render_static_page(&state, StaticPage::ContactUs)
}

async fn version(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    render_static_page(&state, StaticPage::Version)
}

async fn about(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    render_static_page(&state, StaticPage::About)
}

async fn privacy_policy(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    render_static_page(&state, StaticPage::PrivacyPolicy)
}

async fn terms_of_service(State(state): State<SharedAppState>) -> Result<Response, HttpError> {
    render_static_page(&state, StaticPage::TermsOfService)
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    AniList(#[from] AniListError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to read static asset: {0}")]
    StaticAsset(std::io::Error),
}

fn catalog_failure(error: &CatalogError) -> (StatusCode, Cow<'static, str>) {
    match error {
        CatalogError::BaseUrl(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Cow::from("Failed to construct anime catalog request"),
        ),
        _ => (
            StatusCode::BAD_GATEWAY,
            Cow::from("Failed to query the anime catalog"),
        ),
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message): (StatusCode, Cow<'static, str>) = match &self {
            HttpError::NotFound(message) => (StatusCode::NOT_FOUND, Cow::from(*message)),
            HttpError::Viewer(ViewerError::Catalog(error)) | HttpError::Catalog(error) => {
                catalog_failure(error)
            }
            HttpError::Viewer(error) => (StatusCode::NOT_FOUND, Cow::from(error.to_string())),
            HttpError::AniList(_) => (
                StatusCode::BAD_GATEWAY,
                Cow::from("Failed to query AniList"),
            ),
            HttpError::Render(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Cow::from("Failed to render page"),
            ),
            HttpError::StaticAsset(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Cow::from("Failed to read static asset"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("request handler error: {self}");
        } else {
            debug!("request answered with {status}: {message}");
        }

        (status, message).into_response()
    }
}
