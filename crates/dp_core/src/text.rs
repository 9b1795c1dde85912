use std::collections::BTreeSet;
use url::{form_urlencoded, Url};

const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_", "mc_", "icid", "oly_", "vero_id"];
const TRACKING_PARAM_NAMES: &[&str] = &["fbclid", "gclid", "gs_l", "msclkid", "yclid"];

/// Lower-case, URL safe slug. Runs of anything outside `[a-z0-9]` collapse
/// into a single hyphen. Returns an empty string when nothing survives.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for c in value.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

pub fn is_tracking_param(name: &str) -> bool {
    let name = name.to_lowercase();
    TRACKING_PARAM_PREFIXES.iter().any(|p| name.starts_with(p))
        || TRACKING_PARAM_NAMES.contains(&name.as_str())
}

/// Canonical form of an entry link, used as the dedup key.
///
/// Scheme and host are lower-cased and default ports dropped (both done by
/// the `url` parser), the fragment is removed, tracking parameters are
/// stripped and the remaining query segments sorted without re-encoding. Returns `None` for
/// anything that is not an absolute http(s) URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);

    // Kept segments stay byte-for-byte as published.
    let mut segments: Vec<&str> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| !form_urlencoded::parse(segment.as_bytes()).any(|(k, _)| is_tracking_param(&k)))
        .collect();
    segments.sort_unstable();
    let query = segments.join("&");

    url.set_query((!query.is_empty()).then_some(query.as_str()));

    Some(url.to_string())
}

/// Trimmed, lower-cased, de-duplicated tags.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
