//! Auto-title derivation for cards created from shared text.
//!
//! Rules:
//! - Whitespace runs collapse to one space; blank input yields
//!   [`NEW_CLIP_TITLE`].
//! - URL-like input becomes `host` or `host — path` (no scheme, query or
//!   fragment, leading `www.` dropped), clipped to 60 chars.
//! - Anything else is clipped to 40 chars.
//! - Clipping appends `…` only when something was cut.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Title used when shared text is blank after whitespace normalization.
pub const NEW_CLIP_TITLE: &str = "New clip";

const TEXT_TITLE_MAX_CHARS: usize = 40;
const URL_TITLE_MAX_CHARS: usize = 60;
const URL_PATH_MAX_CHARS: usize = 36;
const ELLIPSIS: char = '…';

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://").expect("valid scheme regex"));
static BARE_HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9.\-]+\.[a-z]{2,}(/|\?|$)").expect("valid bare host regex")
});

/// Derives a card title from shared text.
pub fn derive_auto_title(raw: &str) -> String {
    let compact = WHITESPACE_RE.replace_all(raw, " ");
    let compact = compact.trim();
    if compact.is_empty() {
        return NEW_CLIP_TITLE.to_string();
    }

    if looks_like_url(compact) {
        if let Some(title) = url_title(compact) {
            return title;
        }
    }

    clamp_chars(compact, TEXT_TITLE_MAX_CHARS)
}

/// Returns whether text has a `scheme://` prefix or a `host.tld[/path]` shape.
pub fn looks_like_url(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && (SCHEME_RE.is_match(trimmed) || BARE_HOST_RE.is_match(trimmed))
}

fn url_title(compact: &str) -> Option<String> {
    let candidate = if SCHEME_RE.is_match(compact) {
        compact.to_string()
    } else {
        format!("https://{compact}")
    };
    let parsed = Url::parse(&candidate).ok()?;

    let host = parsed.host_str().filter(|host| !host.is_empty())?;
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(host.as_str());
    let host = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let path = match parsed.path() {
        "/" => "",
        other => other,
    };
    let title = if path.is_empty() {
        host
    } else {
        format!("{host} — {}", clamp_chars(path, URL_PATH_MAX_CHARS))
    };

    Some(clamp_chars(&title, URL_TITLE_MAX_CHARS))
}

fn clamp_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(max_chars).collect();
    clipped.push(ELLIPSIS);
    clipped
}
