//! Image URL repair, resolution upgrades and storefront cross-references

use regex_lite::Regex;
use url::Url;

/// IGDB link-site category for Steam store pages.
pub const STEAM_SITE_CATEGORY: u64 = 1;

/// Resolution upgrades tried in order; the first substitution that
/// changes the URL wins.
const SIZE_UPGRADES: &[(&str, &str)] = &[("t_thumb", "t_1080p"), ("t_1080p", "t_original")];

/// A linked external site attached to a provider candidate.
#[derive(Debug, Clone)]
pub struct SiteLink {
    pub category: u64,
    pub url: String,
}

/// Ensure an explicit scheme. IGDB returns protocol-relative URLs
/// (`//images.igdb.com/...`).
pub fn ensure_scheme(raw: &str) -> String {
    let repaired = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else if !raw.contains("://") {
        format!("https://{raw}")
    } else {
        raw.to_string()
    };

    if Url::parse(&repaired).is_err() {
        tracing::debug!("Unparseable image URL from provider: {raw}");
    }
    repaired
}

/// Upgrade the resolution tier of an image URL: substitute the lowest
/// size token for the highest compatible one, stopping at the first
/// substitution that changes the URL.
pub fn upgrade_resolution(url: &str) -> String {
    for (from, to) in SIZE_UPGRADES {
        let upgraded = url.replace(from, to);
        if upgraded != url {
            return upgraded;
        }
    }
    url.to_string()
}

/// Rewrite an image URL to a specific size tier (used when downloading
/// kind-specific assets, e.g. `t_cover_big` covers). Replaces whatever
/// size token the URL currently carries.
pub fn with_size(url: &str, size: &str) -> String {
    let token = Regex::new(r"t_[a-z0-9_]+").expect("valid size token pattern");
    token.replace(url, size).into_owned()
}

/// Scan a candidate's linked sites for the Steam entry and pull the
/// numeric app id out of its path.
pub fn extract_steam_id(sites: &[SiteLink]) -> Option<String> {
    let pattern = Regex::new(r"/app/(\d+)").expect("valid steam app id pattern");
    sites
        .iter()
        .filter(|site| site.category == STEAM_SITE_CATEGORY)
        .find_map(|site| {
            pattern
                .captures(&site.url)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}
