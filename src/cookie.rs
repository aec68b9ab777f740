use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use time::{Duration, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Browsers keep the last viewed episode for thirty days.
const LAST_EPISODE_MAX_AGE: Duration = Duration::days(30);

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

fn last_episode_cookie_name(anime_id: &str) -> String {
    format!("{anime_id}_last")
}

/// Reads the raw `<id>_last` value out of every `Cookie` header.
pub fn read_last_episode(headers: &HeaderMap, anime_id: &str) -> Option<String> {
    let name = last_episode_cookie_name(anime_id);

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

/// Builds the `Set-Cookie` value remembering `episode` for `anime_id`.
///
/// Returns `None` when the identifier cannot be used as a cookie name.
pub fn last_episode_cookie(
    anime_id: &str,
    episode: u32,
    now: OffsetDateTime,
) -> Option<HeaderValue> {
    if anime_id.is_empty() || !anime_id.bytes().all(is_token_byte) {
        return None;
    }

    let expires = (now + LAST_EPISODE_MAX_AGE).format(HTTP_DATE).ok()?;
    let value = format!(
        "{}={episode}; Expires={expires}; Max-Age={}; Path=/",
        last_episode_cookie_name(anime_id),
        LAST_EPISODE_MAX_AGE.whole_seconds(),
    );

    HeaderValue::from_str(&value).ok()
}

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}
