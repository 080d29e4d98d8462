//! IGDB API client: Twitch OAuth, apicalypse queries, bounded retries

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::cmp::Ordering;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use super::images::{self, SiteLink};
use super::{MetadataProvider, TitleCandidate};
use crate::catalog::search::similarity_ratio;

const IGDB_GAMES_ENDPOINT: &str = "https://api.igdb.com/v4/games";
const TWITCH_OAUTH_ENDPOINT: &str = "https://id.twitch.tv/oauth2/token";

/// Refresh tokens this many seconds before the service says they expire.
const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;

const MAX_RETRIES: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 2000;
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Hard cap the service enforces on result pages.
const MAX_SEARCH_LIMIT: usize = 50;

const GAME_FIELDS: &str = "name,rating,cover.url,genres.name,platforms.name,\
first_release_date,summary,screenshots.url,artworks.url,logos.url,\
websites.url,websites.category";

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// IGDB client. Cheap to share behind an `Arc`; the token cache is
/// internal and refreshed on demand.
pub struct IgdbClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    platform_id: u64,
    release_types: Vec<u64>,
    token: Mutex<Option<CachedToken>>,
}

impl IgdbClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        platform_id: u64,
        release_types: Vec<u64>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gamedock/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
            platform_id,
            release_types,
            token: Mutex::new(None),
        })
    }

    /// Current access token, fetching a fresh one when missing or expired.
    async fn token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(cached) = guard.as_ref() {
            if now < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let response = self
            .client
            .post(TWITCH_OAUTH_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("Failed to request IGDB access token")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("IGDB token request failed with status {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse IGDB token response")?;

        tracing::debug!("Obtained IGDB token, expires in {}s", token.expires_in);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: chrono::Utc::now().timestamp() + token.expires_in
                - TOKEN_EXPIRY_SLACK_SECS,
        })
    }

    fn platform_filter(&self) -> String {
        let types = self
            .release_types
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "platforms = ({}) & game_type = ({})",
            self.platform_id, types
        )
    }

    fn search_body(&self, query: &str, limit: usize) -> String {
        // Strip quotes so user input cannot break the apicalypse string.
        let safe_query = query.replace('"', "");
        format!(
            "search \"{}\"; fields {}; where {}; limit {};",
            safe_query,
            GAME_FIELDS,
            self.platform_filter(),
            limit
        )
    }

    fn id_body(&self, igdb_id: u64) -> String {
        format!("fields {GAME_FIELDS}; where id = {igdb_id}; limit 1;")
    }

    /// Execute an apicalypse query against the games endpoint.
    ///
    /// 401 refreshes credentials once and retries exactly once; 429 and
    /// 5xx retry with exponential backoff and jitter; any other
    /// non-success status is a provider error.
    async fn query_games(&self, body: String) -> Result<Vec<GameRecord>> {
        let mut attempt = 0;
        let mut refreshed_auth = false;

        loop {
            attempt += 1;

            let token = self.token().await?;
            let response = self
                .client
                .post(IGDB_GAMES_ENDPOINT)
                .header("Client-ID", &self.client_id)
                .header(ACCEPT, "application/json")
                .bearer_auth(&token)
                .body(body.clone())
                .send()
                .await
                .context("Failed to send IGDB query")?;

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if refreshed_auth {
                    bail!("IGDB rejected credentials after token refresh");
                }
                tracing::debug!("IGDB token rejected, refreshing once");
                self.invalidate_token().await;
                refreshed_auth = true;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RETRIES {
                    bail!("IGDB rate limited after {MAX_RETRIES} retries");
                }

                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or_else(|| backoff_delay_ms(attempt));

                tracing::warn!(
                    "IGDB rate limited (attempt {}/{}), retrying in {}ms",
                    attempt,
                    MAX_RETRIES,
                    retry_after
                );
                sleep(Duration::from_millis(retry_after)).await;
                continue;
            }

            if status.is_server_error() {
                if attempt >= MAX_RETRIES {
                    bail!("IGDB server error after {MAX_RETRIES} retries: {status}");
                }

                let delay = backoff_delay_ms(attempt);
                tracing::warn!(
                    "IGDB server error {} (attempt {}/{}), retrying in {}ms",
                    status,
                    attempt,
                    MAX_RETRIES,
                    delay
                );
                sleep(Duration::from_millis(delay)).await;
                continue;
            }

            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                bail!("IGDB query failed with status {status}: {body_text}");
            }

            return response
                .json()
                .await
                .context("Failed to parse IGDB response");
        }
    }
}

/// Exponential backoff with 85-115% jitter, capped.
fn backoff_delay_ms(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS.saturating_mul(1 << (attempt - 1));
    let jitter = 0.85 + rand::random::<f64>() * 0.3;
    ((base_delay as f64 * jitter) as u64).min(MAX_RETRY_DELAY_MS)
}

#[async_trait]
impl MetadataProvider for IgdbClient {
    async fn lookup(&self, name: &str) -> Result<Option<TitleCandidate>> {
        let records = self.query_games(self.search_body(name, 1)).await?;
        Ok(records.into_iter().find_map(to_candidate))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<TitleCandidate>> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        let records = self.query_games(self.search_body(query, limit)).await?;

        // Rating-less candidates are noise for ad hoc search; rank the
        // rest by name similarity to the raw query. The sort is stable,
        // so ties keep the service's response order.
        let mut scored: Vec<(f32, TitleCandidate)> = records
            .into_iter()
            .filter_map(to_candidate)
            .filter(|c| c.rating.is_some())
            .map(|c| (similarity_ratio(&c.name, query), c))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    async fn by_external_id(&self, igdb_id: u64) -> Result<Option<TitleCandidate>> {
        let records = self.query_games(self.id_body(igdb_id)).await?;
        Ok(records.into_iter().find_map(to_candidate))
    }
}

#[derive(Debug, Deserialize)]
struct GameRecord {
    id: u64,
    name: Option<String>,
    rating: Option<f64>,
    cover: Option<ImageRef>,
    genres: Option<Vec<NamedRef>>,
    platforms: Option<Vec<NamedRef>>,
    first_release_date: Option<i64>,
    summary: Option<String>,
    screenshots: Option<Vec<ImageRef>>,
    artworks: Option<Vec<ImageRef>>,
    logos: Option<Vec<ImageRef>>,
    websites: Option<Vec<WebsiteRecord>>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WebsiteRecord {
    category: Option<u64>,
    url: Option<String>,
}

fn normalize_image(raw: &str) -> String {
    images::upgrade_resolution(&images::ensure_scheme(raw))
}

fn image_urls(refs: Option<Vec<ImageRef>>) -> Vec<String> {
    refs.unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.url)
        .map(|u| normalize_image(&u))
        .collect()
}

/// Map a raw service record into a candidate; records without a name are
/// dropped.
fn to_candidate(record: GameRecord) -> Option<TitleCandidate> {
    let name = record.name?;

    let sites: Vec<SiteLink> = record
        .websites
        .unwrap_or_default()
        .into_iter()
        .filter_map(|w| {
            Some(SiteLink {
                category: w.category?,
                url: w.url?,
            })
        })
        .collect();

    Some(TitleCandidate {
        igdb_id: record.id,
        name,
        genres: record
            .genres
            .unwrap_or_default()
            .into_iter()
            .map(|g| g.name)
            .collect(),
        platforms: record
            .platforms
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.name)
            .collect(),
        first_release_date: record.first_release_date,
        summary: record.summary,
        rating: record.rating,
        cover_url: record
            .cover
            .and_then(|c| c.url)
            .map(|u| normalize_image(&u)),
        screenshot_urls: image_urls(record.screenshots),
        artwork_urls: image_urls(record.artworks),
        logo_urls: image_urls(record.logos),
        steam_id: images::extract_steam_id(&sites),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IgdbClient {
        IgdbClient::new("id".to_string(), "secret".to_string(), 6, vec![0]).unwrap()
    }

    #[test]
    fn search_body_strips_quotes_and_applies_filters() {
        let body = client().search_body("Portal \"2\"", 10);
        assert_eq!(
            body,
            format!(
                "search \"Portal 2\"; fields {GAME_FIELDS}; \
                 where platforms = (6) & game_type = (0); limit 10;"
            )
        );
    }

    #[test]
    fn id_body_queries_by_identifier() {
        let body = client().id_body(620);
        assert!(body.contains("where id = 620;"));
        assert!(body.contains("limit 1;"));
    }

    #[test]
    fn release_type_whitelist_is_joined() {
        let client = IgdbClient::new("id".to_string(), "secret".to_string(), 6, vec![0, 8]).unwrap();
        assert!(client
            .platform_filter()
            .ends_with("game_type = (0,8)"));
    }

    #[test]
    fn to_candidate_maps_record_fields() {
        let record: GameRecord = serde_json::from_value(serde_json::json!({
            "id": 620,
            "name": "Portal 2",
            "rating": 91.5,
            "cover": { "url": "//images.igdb.com/t_thumb/co1rs4.jpg" },
            "genres": [{ "name": "Puzzle" }],
            "platforms": [{ "name": "PC (Microsoft Windows)" }],
            "first_release_date": 1303171200,
            "summary": "Sequel.",
            "screenshots": [{ "url": "//images.igdb.com/t_thumb/sc1.jpg" }],
            "websites": [
                { "category": 1, "url": "https://store.steampowered.com/app/620" }
            ]
        }))
        .unwrap();

        let candidate = to_candidate(record).unwrap();
        assert_eq!(candidate.igdb_id, 620);
        assert_eq!(
            candidate.cover_url.as_deref(),
            Some("https://images.igdb.com/t_1080p/co1rs4.jpg")
        );
        assert_eq!(
            candidate.screenshot_urls,
            vec!["https://images.igdb.com/t_1080p/sc1.jpg"]
        );
        assert_eq!(candidate.steam_id.as_deref(), Some("620"));
        assert_eq!(candidate.genres, vec!["Puzzle"]);
    }

    #[test]
    fn nameless_records_are_dropped() {
        let record: GameRecord =
            serde_json::from_value(serde_json::json!({ "id": 1 })).unwrap();
        assert!(to_candidate(record).is_none());
    }
}
