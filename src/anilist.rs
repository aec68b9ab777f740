use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const DETAILS_QUERY: &str = r#"
query ($search: String) {
  Media(search: $search, type: ANIME) {
    id
    title {
      romaji
      english
      native
    }
    description
    episodes
    startDate {
      year
      month
      day
    }
    status
    averageScore
    coverImage {
      large
    }
  }
}
"#;

const NO_TITLE: &str = "No title available.";
const NO_DESCRIPTION: &str = "No description available.";
const NO_EPISODES: &str = "Not specified.";
const NO_STATUS: &str = "No status available.";
const NO_SCORE: &str = "No score available.";
const UNKNOWN_YEAR: &str = "Unknown";
const UNKNOWN_MONTH_OR_DAY: &str = "00";

#[derive(Debug, Clone)]
pub struct AniListClient {
    http: Client,
    endpoint: Url,
}

impl AniListClient {
    pub fn new(endpoint: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("aniview/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, endpoint })
    }

    /// Looks up the best AniList match for a free-text title.
    ///
    /// Returns `Ok(None)` when AniList answers with a non-success status or
    /// with a null, absent or empty `Media` record.
    pub async fn fetch_details(&self, name: &str) -> Result<Option<AnimeDetails>, AniListError> {
        let request = GraphqlRequest {
            query: DETAILS_QUERY,
            variables: GraphqlVariables { search: name },
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(name, status = status.as_u16(), "AniList returned no match");
            return Ok(None);
        }

        let body = response.bytes().await?;
        let payload: GraphqlResponse = serde_json::from_slice(&body)?;

        let Some(data) = payload.data else {
            if let Some(errors) = payload.errors
                && !errors.is_empty()
            {
                return Err(AniListError::Graphql(
                    errors
                        .into_iter()
                        .map(|err| err.message)
                        .collect::<Vec<_>>()
                        .join(", "),
                ));
            }
            debug!(name, "AniList response carried no data");
            return Ok(None);
        };

        match data.media.filter(|media| !media.is_empty()) {
            Some(media) => {
                debug!(name, anilist_id = media.id, "AniList media resolved");
                Ok(Some(AnimeDetails::from(media)))
            }
            None => {
                debug!(name, "AniList response carried no media");
                Ok(None)
            }
        }
    }
}

/// Flattened AniList metadata, every field already substituted with its
/// display fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeDetails {
    pub title_romaji: String,
    pub title_english: String,
    pub title_native: String,
    pub description: String,
    pub episodes: String,
    pub start_date: String,
    pub status: String,
    pub average_score: String,
    pub cover_image: String,
}

impl From<GraphqlMedia> for AnimeDetails {
    fn from(media: GraphqlMedia) -> Self {
        let title = media.title.unwrap_or_default();
        let start = media.start_date.unwrap_or_default();

        let year = start
            .year
            .map(|value| value.to_string())
            .unwrap_or_else(|| UNKNOWN_YEAR.to_string());
        let month = start
            .month
            .map(|value| value.to_string())
            .unwrap_or_else(|| UNKNOWN_MONTH_OR_DAY.to_string());
        let day = start
            .day
            .map(|value| value.to_string())
            .unwrap_or_else(|| UNKNOWN_MONTH_OR_DAY.to_string());

        Self {
            title_romaji: title.romaji.unwrap_or_else(|| NO_TITLE.to_string()),
            title_english: title.english.unwrap_or_else(|| NO_TITLE.to_string()),
            title_native: title.native.unwrap_or_else(|| NO_TITLE.to_string()),
            description: media
                .description
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            episodes: media
                .episodes
                .map(|value| value.to_string())
                .unwrap_or_else(|| NO_EPISODES.to_string()),
            start_date: format!("{year}-{month}-{day}"),
            status: media.status.unwrap_or_else(|| NO_STATUS.to_string()),
            average_score: media
                .average_score
                .map(|value| value.to_string())
                .unwrap_or_else(|| NO_SCORE.to_string()),
            cover_image: media
                .cover_image
                .and_then(|cover| cover.large)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: GraphqlVariables<'a>,
}

#[derive(Debug, Serialize)]
struct GraphqlVariables<'a> {
    search: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    #[serde(rename = "Media")]
    media: Option<GraphqlMedia>,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlMedia {
    id: Option<i64>,
    title: Option<GraphqlTitle>,
    description: Option<String>,
    episodes: Option<u32>,
    #[serde(rename = "startDate")]
    start_date: Option<FuzzyDate>,
    status: Option<String>,
    #[serde(rename = "averageScore")]
    average_score: Option<u32>,
    #[serde(rename = "coverImage")]
    cover_image: Option<CoverImage>,
}

impl GraphqlMedia {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.title.as_ref().is_none_or(GraphqlTitle::is_empty)
            && self.description.is_none()
            && self.episodes.is_none()
            && self.start_date.as_ref().is_none_or(FuzzyDate::is_empty)
            && self.status.is_none()
            && self.average_score.is_none()
            && self.cover_image.as_ref().is_none_or(|cover| cover.large.is_none())
    }
}

#[derive(Debug, Default, Deserialize)]
struct GraphqlTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

impl GraphqlTitle {
    fn is_empty(&self) -> bool {
        self.romaji.is_none() && self.english.is_none() && self.native.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
struct FuzzyDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl FuzzyDate {
    fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct CoverImage {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Error)]
pub enum AniListError {
    #[error("http error when querying AniList GraphQL API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to deserialise AniList response payload: {0}")]
    Deserialisation(#[from] serde_json::Error),
    #[error("AniList GraphQL error(s): {0}")]
    Graphql(String),
}
