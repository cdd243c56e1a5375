//! URL normalization used as the deduplication key

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Query parameters that only carry tracking information
const TRACKING_PARAMS: &[&str] = &[
    // Google
    "gclid",
    "gclsrc",
    // Facebook
    "fbclid",
    "fb_action_ids",
    "fb_action_types",
    "fb_source",
    "fb_ref",
    // Microsoft
    "msclkid",
    // Twitter
    "twclid",
    // Mailchimp
    "mc_eid",
    "mc_cid",
    // HubSpot
    "_hsenc",
    "_hsmi",
    "__hstc",
    "__hsfp",
    "hsctatracking",
    // Adobe
    "s_kwcid",
    // General
    "ref",
    "ref_",
    "click_id",
    "campaign_id",
    "ad_id",
];

static TRACKING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^utm_.*$", r"^_ga.*$"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

fn is_tracking_param(param: &str) -> bool {
    let param = param.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&param.as_str())
        || TRACKING_PATTERNS.iter().any(|p| p.is_match(&param))
}

/// Normalize a URL for deduplication.
///
/// Lower-cases scheme and host, strips tracking query parameters and the
/// fragment, and removes a trailing slash. Input that does not parse as an
/// absolute URL is trimmed and returned otherwise unchanged.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_string();
    };

    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    // The url crate always serializes an empty path as "/".
    let normalized = parsed.to_string();
    if parsed.query().is_none() && parsed.path() == "/" {
        normalized.trim_end_matches('/').to_string()
    } else {
        normalized
    }
}
