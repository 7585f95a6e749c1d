// src/core/candidates.rs

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use url::Url;

/// Common subdomain tokens appended to the wordlist in permutation mode.
pub const DEFAULT_PERMUTATION_WORDS: &[&str] = &[
    "www", "www1", "www2", "admin", "administrator", "api", "apis", "app", "apps",
    "assets", "beta", "blog", "cdn", "chat", "cms", "cpanel", "db", "demo", "dev",
    "devops", "docs", "download", "downloads", "edge", "files", "forum", "ftp",
    "git", "gitlab", "github", "help", "images", "img", "imap", "internal",
    "intranet", "jenkins", "jira", "lab", "mail", "mail2", "media", "mobile",
    "monitor", "mx", "ns1", "ns2", "ns3", "ns4", "portal", "prod", "qa", "sso",
    "smtp", "stage", "staging", "static", "status", "store", "support", "test",
    "test1", "test2", "uat", "vpn", "web", "webmail", "wiki",
];

/// Reduces user input to a bare, lower-cased registrable domain: scheme and
/// path are stripped, trailing dots trimmed.
pub fn normalize_domain(input: &str) -> String {
    let raw = input.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    match Url::parse(&with_scheme) {
        Ok(url) => url
            .host_str()
            .unwrap_or_default()
            .trim_end_matches('.')
            .to_lowercase(),
        Err(_) => raw.trim_end_matches('.').to_lowercase(),
    }
}

/// Hostname-shaped check: dot-separated alphanumeric/hyphen labels, no label
/// starting or ending with a hyphen, at least one dot overall.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || !domain.contains('.') || domain.len() > 253 {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Reads a wordlist (or host list) file: one entry per line, `#`/`;` comment
/// lines skipped, entries lower-cased and dot-trimmed, deduplicated in
/// first-seen order. An unreadable file yields an empty list rather than an
/// error, the caller decides whether that is fatal.
pub fn read_wordlist(path: &Path) -> Vec<String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read wordlist.");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut words = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let word = line.to_lowercase();
        let word = word.trim_matches('.');
        if word.is_empty() {
            continue;
        }
        if seen.insert(word.to_string()) {
            words.push(word.to_string());
        }
    }

    debug!(path = %path.display(), count = words.len(), "Wordlist loaded.");
    words
}

/// Appends the built-in permutation tokens, deduplicating while keeping
/// first-seen order.
pub fn with_permutations(words: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(words.len() + DEFAULT_PERMUTATION_WORDS.len());
    for word in words
        .into_iter()
        .chain(DEFAULT_PERMUTATION_WORDS.iter().map(|w| w.to_string()))
    {
        if seen.insert(word.clone()) {
            merged.push(word);
        }
    }
    merged
}

/// Expands words into candidate hostnames under `domain`.
///
/// A word that already contains a dot and ends with the domain is treated as
/// a fully-qualified override and used as-is; anything else is joined as
/// `word.domain`. Empty, `@` and `*` entries are skipped. Output is
/// deduplicated in first-seen order.
pub fn build_candidates(domain: &str, words: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();

    for word in words {
        let word = word.trim();
        if word.is_empty() || word == "@" || word == "*" {
            continue;
        }
        let word = word.trim_matches('.');
        if word.is_empty() {
            continue;
        }

        let host = if word.contains('.') && word.ends_with(domain) {
            word.to_string()
        } else {
            format!("{}.{}", word, domain)
        };

        if seen.insert(host.clone()) {
            hosts.push(host);
        }
    }

    hosts
}
