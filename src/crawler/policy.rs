//! URL admission policy and link normalization.

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// File extensions that never yield indexable HTML.
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css",
    ".js", ".zip", ".rar", ".tar", ".gz", ".mp3", ".mp4", ".avi", ".mov", ".exe", ".dmg",
    ".woff", ".woff2",
];

/// Social/media platforms that never yield indexable article content.
const DENIED_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "reddit.com",
];

/// Path prefixes that mark account/administrative pages with no content value.
const SKIPPED_PATH_PREFIXES: &[&str] = &[
    "/login", "/signup", "/register", "/logout", "/password", "/admin", "/dashboard",
    "/account", "/profile",
];

/// Allow/deny policy applied to every frontier entry before it is fetched.
///
/// The default deny list covers the social/media platforms in
/// [`DENIED_DOMAINS`]; a denied entry matches the host itself and any of
/// its subdomains.
#[derive(Clone, Debug)]
pub struct LinkPolicy {
    /// Domains that must never be fetched (case-insensitive, subdomains
    /// included).
    pub denied_hosts: Vec<String>,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            denied_hosts: DENIED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl LinkPolicy {
    /// A policy with an empty deny list.
    pub fn permissive() -> Self {
        Self {
            denied_hosts: Vec::new(),
        }
    }

    #[must_use]
    pub fn deny_host(mut self, host: impl Into<String>) -> Self {
        self.denied_hosts.push(host.into().to_ascii_lowercase());
        self
    }

    /// Returns `true` when the URL may be fetched.
    pub fn is_allowed(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        if let Some(host) = url.host_str() {
            let host = host.to_ascii_lowercase();
            let denied = self.denied_hosts.iter().any(|denied| {
                host == *denied || host.ends_with(&format!(".{denied}"))
            });
            if denied {
                return false;
            }
        }
        let path = url.path().to_ascii_lowercase();
        if SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }
        if SKIPPED_PATH_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
        {
            return false;
        }
        true
    }
}

/// Resolves an `href` against its base page and normalizes it for the
/// frontier: http(s) only, fragment stripped, query preserved.
pub fn normalize_link(base: &Url, href: &str) -> Option<Url> {
    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Harvests outbound links from raw HTML, normalized and deduplicated in
/// first-seen order.
pub fn extract_links(raw_html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(raw_html);
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = normalize_link(base, href) else {
            continue;
        };
        if seen.insert(url.as_str().to_string()) {
            links.push(url);
        }
    }
    links
}
