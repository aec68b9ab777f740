use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use thiserror::Error;

use crate::anilist::AnimeDetails;
use crate::viewer::Viewer;

type HtmlWriter = Writer<Vec<u8>>;

#[derive(Debug, Clone)]
pub struct SiteMeta {
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticPage {
    ContactUs,
    Version,
    About,
    PrivacyPolicy,
    TermsOfService,
}

impl StaticPage {
    pub const ALL: [StaticPage; 5] = [
        StaticPage::About,
        StaticPage::ContactUs,
        StaticPage::Version,
        StaticPage::PrivacyPolicy,
        StaticPage::TermsOfService,
    ];

    pub fn path(self) -> &'static str {
        match self {
            StaticPage::ContactUs => "/contact-us",
            StaticPage::Version => "/version",
            StaticPage::About => "/about",
            StaticPage::PrivacyPolicy => "/privacy-policy",
            StaticPage::TermsOfService => "/terms-of-service",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StaticPage::ContactUs => "Contact Us",
            StaticPage::Version => "Version",
            StaticPage::About => "About",
            StaticPage::PrivacyPolicy => "Privacy Policy",
            StaticPage::TermsOfService => "Terms of Service",
        }
    }

    fn paragraphs(self, site: &SiteMeta) -> Vec<String> {
        match self {
            StaticPage::ContactUs => vec![
                format!("Questions or takedown requests for {} can be sent to the site operator.", site.title),
                "Please include the page address you are writing about.".to_string(),
            ],
            StaticPage::Version => vec![format!(
                "{} is running version {}.",
                site.title,
                env!("CARGO_PKG_VERSION")
            )],
            StaticPage::About => vec![
                format!("{} is a lightweight front end for browsing anime.", site.title),
                "Catalog data, episodes and streams come from a third-party catalog API; descriptive metadata comes from AniList.".to_string(),
            ],
            StaticPage::PrivacyPolicy => vec![
                "No account is required and no personal data is stored on the server.".to_string(),
                "A cookie per title remembers the last episode you watched for thirty days.".to_string(),
            ],
            StaticPage::TermsOfService => vec![
                "This site does not host any media; every stream is served by third parties.".to_string(),
                "The service is provided as is, without warranty of availability.".to_string(),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write HTML document")]
    Io(#[from] std::io::Error),
    #[error("failed to build HTML document")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to format HTML document as UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A titled list of catalog entries found in the home feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeSection {
    pub title: String,
    pub entries: Vec<CatalogCard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCard {
    pub id: String,
    pub name: String,
    pub poster: Option<String>,
}

/// Collects every list of `{id, name}` objects in the feed, including lists
/// nested one level deep such as the top-10 rankings.
pub fn home_sections(feed: &Value) -> Vec<HomeSection> {
    let mut sections = Vec::new();
    let Some(fields) = feed.as_object() else {
        return sections;
    };

    for (key, value) in fields {
        match value {
            Value::Array(items) => push_section(&mut sections, humanize_key(key), items),
            Value::Object(nested) => {
                for (inner_key, inner) in nested {
                    if let Value::Array(items) = inner {
                        let title = format!("{} {}", humanize_key(key), humanize_key(inner_key));
                        push_section(&mut sections, title, items);
                    }
                }
            }
            _ => {}
        }
    }

    sections
}

fn push_section(sections: &mut Vec<HomeSection>, title: String, items: &[Value]) {
    let entries: Vec<CatalogCard> = items.iter().filter_map(catalog_card).collect();
    if !entries.is_empty() {
        sections.push(HomeSection { title, entries });
    }
}

fn catalog_card(item: &Value) -> Option<CatalogCard> {
    let id = item.get("id")?.as_str()?;
    let name = item.get("name")?.as_str()?;
    Some(CatalogCard {
        id: id.to_string(),
        name: name.to_string(),
        poster: item
            .get("poster")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn humanize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (index, ch) in key.chars().enumerate() {
        if index == 0 {
            out.extend(ch.to_uppercase());
        } else if ch.is_ascii_uppercase() {
            out.push(' ');
            out.push(ch);
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn anime_href(anime_id: &str) -> String {
    format!("/anime/{}", urlencoding::encode(anime_id))
}

fn episode_href(anime_id: &str, episode: u32) -> String {
    format!("{}?episode={episode}", anime_href(anime_id))
}

fn details_href(name: &str) -> String {
    format!("/details/{}", urlencoding::encode(name))
}

pub fn render_home(site: &SiteMeta, feed: &Value) -> Result<String, RenderError> {
    let sections = home_sections(feed);

    render_document(site, "Home", |writer| {
        if sections.is_empty() {
            text_element(writer, "p", &[], "Nothing to show right now.")?;
        }

        for section in &sections {
            open(writer, "section", &[("class", "feed")])?;
            text_element(writer, "h2", &[], &section.title)?;
            open(writer, "ul", &[("class", "cards")])?;
            for card in &section.entries {
                let href = anime_href(&card.id);
                open(writer, "li", &[])?;
                open(writer, "a", &[("href", href.as_str())])?;
                if let Some(poster) = card.poster.as_deref() {
                    void_element(
                        writer,
                        "img",
                        &[("src", poster), ("alt", card.name.as_str()), ("loading", "lazy")],
                    )?;
                }
                text_element(writer, "span", &[], &card.name)?;
                close(writer, "a")?;
                close(writer, "li")?;
            }
            close(writer, "ul")?;
            close(writer, "section")?;
        }

        Ok(())
    })
}

pub fn render_anime(site: &SiteMeta, anime_id: &str, viewer: &Viewer) -> Result<String, RenderError> {
    let info = viewer.anime.get("info");
    let name = info
        .and_then(|info| info.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(anime_id);
    let poster = info.and_then(|info| info.get("poster")).and_then(Value::as_str);
    let description = info
        .and_then(|info| info.get("description"))
        .and_then(Value::as_str);

    render_document(site, name, |writer| {
        open(writer, "section", &[("class", "player")])?;
        let heading = format!("Episode {}", viewer.current_episode);
        text_element(writer, "h2", &[], &heading)?;
        match viewer.embed_url.as_deref() {
            Some(url) => {
                open(
                    writer,
                    "iframe",
                    &[
                        ("src", url),
                        ("title", heading.as_str()),
                        ("allowfullscreen", "allowfullscreen"),
                        ("referrerpolicy", "no-referrer"),
                    ],
                )?;
                close(writer, "iframe")?;
            }
            None => text_element(
                writer,
                "p",
                &[("class", "notice")],
                "No playable source is available for this episode.",
            )?,
        }
        close(writer, "section")?;

        open(writer, "section", &[("class", "info")])?;
        if let Some(poster) = poster {
            void_element(writer, "img", &[("src", poster), ("alt", name)])?;
        }
        if let Some(description) = description {
            text_element(writer, "p", &[], description)?;
        }
        write_more_info(writer, viewer.anime.get("moreInfo"))?;
        let details = details_href(name);
        text_element(writer, "a", &[("href", details.as_str())], "AniList details")?;
        close(writer, "section")?;

        open(writer, "section", &[("class", "episodes")])?;
        text_element(writer, "h2", &[], "Episodes")?;
        open(writer, "ol", &[])?;
        for (index, episode) in viewer.episodes.iter().enumerate() {
            let number = episode
                .number
                .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX));
            let href = episode_href(anime_id, number);
            let label = match episode.title.as_deref() {
                Some(title) => format!("{number}. {title}"),
                None => format!("Episode {number}"),
            };

            let mut attrs: Vec<(&str, &str)> = Vec::new();
            if number == viewer.current_episode {
                attrs.push(("class", "current"));
            } else if episode.is_filler {
                attrs.push(("class", "filler"));
            }

            open(writer, "li", &attrs)?;
            if number == viewer.current_episode {
                text_element(
                    writer,
                    "a",
                    &[("href", href.as_str()), ("aria-current", "page")],
                    &label,
                )?;
            } else {
                text_element(writer, "a", &[("href", href.as_str())], &label)?;
            }
            close(writer, "li")?;
        }
        close(writer, "ol")?;
        close(writer, "section")?;

        Ok(())
    })
}

fn write_more_info(writer: &mut HtmlWriter, more_info: Option<&Value>) -> Result<(), RenderError> {
    let Some(fields) = more_info.and_then(Value::as_object) else {
        return Ok(());
    };

    let rows: Vec<(String, String)> = fields
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => return None,
            };
            (!rendered.is_empty()).then(|| (humanize_key(key), rendered))
        })
        .collect();

    if rows.is_empty() {
        return Ok(());
    }

    open(writer, "dl", &[])?;
    for (label, value) in &rows {
        text_element(writer, "dt", &[], label)?;
        text_element(writer, "dd", &[], value)?;
    }
    close(writer, "dl")?;
    Ok(())
}

pub fn render_details(site: &SiteMeta, details: &AnimeDetails) -> Result<String, RenderError> {
    render_document(site, &details.title_romaji, |writer| {
        if !details.cover_image.is_empty() {
            void_element(
                writer,
                "img",
                &[
                    ("src", details.cover_image.as_str()),
                    ("alt", details.title_romaji.as_str()),
                ],
            )?;
        }

        let rows = [
            ("English title", &details.title_english),
            ("Native title", &details.title_native),
            ("Episodes", &details.episodes),
            ("Start date", &details.start_date),
            ("Status", &details.status),
            ("Average score", &details.average_score),
        ];
        open(writer, "dl", &[])?;
        for (label, value) in rows {
            text_element(writer, "dt", &[], label)?;
            text_element(writer, "dd", &[], value)?;
        }
        close(writer, "dl")?;

        text_element(writer, "p", &[("class", "description")], &details.description)?;
        Ok(())
    })
}

pub fn render_static(site: &SiteMeta, page: StaticPage) -> Result<String, RenderError> {
    let paragraphs = page.paragraphs(site);
    render_document(site, page.title(), |writer| {
        for paragraph in &paragraphs {
            text_element(writer, "p", &[], paragraph)?;
        }
        Ok(())
    })
}

fn render_document<F>(site: &SiteMeta, heading: &str, body: F) -> Result<String, RenderError>
where
    F: FnOnce(&mut HtmlWriter) -> Result<(), RenderError>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::DocType(BytesText::from_escaped("html")))?;
    open(&mut writer, "html", &[("lang", "en")])?;

    open(&mut writer, "head", &[])?;
    void_element(&mut writer, "meta", &[("charset", "utf-8")])?;
    void_element(
        &mut writer,
        "meta",
        &[
            ("name", "viewport"),
            ("content", "width=device-width, initial-scale=1"),
        ],
    )?;
    text_element(
        &mut writer,
        "title",
        &[],
        &format!("{heading} | {}", site.title),
    )?;
    void_element(
        &mut writer,
        "link",
        &[("rel", "icon"), ("href", "/favicon.ico")],
    )?;
    close(&mut writer, "head")?;

    open(&mut writer, "body", &[])?;
    open(&mut writer, "header", &[])?;
    text_element(&mut writer, "a", &[("href", "/"), ("class", "brand")], &site.title)?;
    open(
        &mut writer,
        "form",
        &[("action", "/search"), ("method", "get"), ("role", "search")],
    )?;
    void_element(
        &mut writer,
        "input",
        &[
            ("type", "search"),
            ("name", "query"),
            ("placeholder", "Search anime"),
            ("required", "required"),
        ],
    )?;
    text_element(&mut writer, "button", &[("type", "submit")], "Search")?;
    close(&mut writer, "form")?;
    close(&mut writer, "header")?;

    open(&mut writer, "main", &[])?;
    text_element(&mut writer, "h1", &[], heading)?;
    body(&mut writer)?;
    close(&mut writer, "main")?;

    open(&mut writer, "footer", &[])?;
    open(&mut writer, "nav", &[])?;
    for page in StaticPage::ALL {
        text_element(&mut writer, "a", &[("href", page.path())], page.title())?;
    }
    close(&mut writer, "nav")?;
    close(&mut writer, "footer")?;

    close(&mut writer, "body")?;
    close(&mut writer, "html")?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn open(writer: &mut HtmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
    let mut element = BytesStart::new(name);
    for attr in attrs {
        element.push_attribute(*attr);
    }
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn close(writer: &mut HtmlWriter, name: &str) -> Result<(), RenderError> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn void_element(
    writer: &mut HtmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
) -> Result<(), RenderError> {
    let mut element = BytesStart::new(name);
    for attr in attrs {
        element.push_attribute(*attr);
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn text_element(
    writer: &mut HtmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
    value: &str,
) -> Result<(), RenderError> {
    open(writer, name, attrs)?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    close(writer, name)
}
