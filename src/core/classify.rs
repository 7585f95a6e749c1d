// src/core/classify.rs

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::core::models::{ProbeOptions, ProbeResult, Target};

/// Built-in header patterns enabled by `--fingerprints=default`.
pub const DEFAULT_HEADER_PATTERNS: &[&str] =
    &["x-zero-rated", "x-freebasics", "x-captive-portal", "x-portal"];

/// Built-in body patterns enabled by `--fingerprints=default`.
pub const DEFAULT_BODY_PATTERNS: &[&str] =
    &["free basics", "zero rated", "captive portal", "walled garden"];

/// Only this many leading bytes of a body are considered for `<title>`
/// extraction.
const TITLE_SCAN_LIMIT: usize = 20_000;

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector is valid"));

/// Case-insensitive multi-map of response headers.
///
/// Names are lower-cased on insertion; repeated names collapse into an
/// ordered list of values, and single-value access means "first element".
#[derive(Debug, Clone, Default)]
pub struct HeaderBag {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderBag {
    pub fn from_reqwest(map: &reqwest::header::HeaderMap) -> Self {
        let mut bag = Self::default();
        for (name, value) in map.iter() {
            let text = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
            bag.push(name.as_str(), text);
        }
        bag
    }

    pub fn push(&mut self, name: &str, value: String) {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// First value for `name`, if present.
    pub fn first(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// Flattened `name: value\n` text used for header pattern matching;
    /// multiple values for one name are joined with `; `.
    pub fn flatten(&self) -> String {
        let mut text = String::new();
        for (name, values) in &self.entries {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(&values.join("; "));
            text.push('\n');
        }
        text
    }
}

/// Everything the prober hands over from one completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderBag,
    /// Lossily-decoded body text, capped at the configured capture size.
    pub body: String,
    /// Bytes actually downloaded, used when `content-length` is absent.
    pub downloaded: usize,
    pub elapsed_ms: u64,
    /// Peer address observed on the connection, empty when unavailable.
    pub peer_ip: String,
}

/// Extracts the text of the first `<title>` element from an HTML body.
/// Entities are decoded by the parser; only the leading part of large bodies
/// is scanned.
pub fn extract_title(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    let mut end = body.len().min(TITLE_SCAN_LIMIT);
    while end < body.len() && !body.is_char_boundary(end) {
        end -= 1;
    }
    let document = Html::parse_document(&body[..end]);
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Case-insensitive substring search; returns the patterns (as configured)
/// that occur in `haystack`.
pub fn match_patterns(haystack: &str, patterns: &[String]) -> Vec<String> {
    if patterns.is_empty() {
        return Vec::new();
    }
    let haystack = haystack.to_lowercase();
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter(|p| haystack.contains(&p.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Liveness predicate: exact membership when live codes are configured,
/// otherwise any non-error status in `200..400`.
pub fn is_live(status: u16, live_codes: &[u16]) -> bool {
    if live_codes.is_empty() {
        (200..400).contains(&status)
    } else {
        live_codes.contains(&status)
    }
}

/// Builds the `;`-joined notes string from pattern matches and redirect
/// heuristics.
pub fn build_notes(
    headers: &HeaderBag,
    body: &str,
    redirect_url: &str,
    options: &ProbeOptions,
) -> String {
    let mut notes = Vec::new();

    if !options.header_patterns.is_empty() {
        let matches = match_patterns(&headers.flatten(), &options.header_patterns);
        if !matches.is_empty() {
            notes.push(format!("header_matches={}", matches.join("|")));
        }
    }

    if !options.body_patterns.is_empty() && !body.is_empty() {
        let matches = match_patterns(body, &options.body_patterns);
        if !matches.is_empty() {
            notes.push(format!("body_matches={}", matches.join("|")));
        }
    }

    // A redirect into a captive portal is a strong walled-garden signal.
    if !redirect_url.is_empty() && redirect_url.to_lowercase().contains("captive") {
        notes.push("redirect_hint=captive_portal".to_string());
    }

    notes.join(";")
}

/// Derives the final `ProbeResult` for a completed exchange.
pub fn classify_response(
    target: &Target,
    response: &RawResponse,
    options: &ProbeOptions,
) -> ProbeResult {
    let headers = &response.headers;
    let server = headers.first("server").unwrap_or_default().to_string();
    let redirect_url = headers.first("location").unwrap_or_default().to_string();
    let content_type = headers.first("content-type").unwrap_or_default().to_lowercase();

    let content_length = match headers.first("content-length") {
        Some(value) => value.trim().parse::<u64>().unwrap_or(0),
        None => response.downloaded as u64,
    };

    let title = if options.capture_body
        && !response.body.is_empty()
        && content_type.contains("text/html")
    {
        extract_title(&response.body)
    } else {
        String::new()
    };

    let notes = build_notes(headers, &response.body, &redirect_url, options);
    let ip = if target.ip.is_empty() { response.peer_ip.clone() } else { target.ip.clone() };

    ProbeResult {
        host: target.host.clone(),
        protocol: target.protocol,
        port: target.port,
        ip,
        status_code: response.status,
        response_time_ms: response.elapsed_ms,
        content_length,
        server,
        title,
        redirect_url,
        notes,
        is_live: is_live(response.status, &options.live_codes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Protocol;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|p| p.to_string()).collect()
    }

    fn sample_response() -> RawResponse {
        let mut headers = HeaderBag::default();
        headers.push("Server", "nginx/1.24".to_string());
        headers.push("Content-Type", "text/html; charset=utf-8".to_string());
        headers.push("Set-Cookie", "a=1".to_string());
        headers.push("Set-Cookie", "b=2".to_string());
        RawResponse {
            status: 200,
            headers,
            body: "<html><head><title> Hello &amp; Welcome </title></head></html>".to_string(),
            downloaded: 62,
            elapsed_ms: 12,
            peer_ip: "203.0.113.9".to_string(),
        }
    }

    #[test]
    fn header_bag_is_case_insensitive_and_ordered() {
        let response = sample_response();
        assert_eq!(response.headers.first("SERVER"), Some("nginx/1.24"));
        assert_eq!(response.headers.first("set-cookie"), Some("a=1"));
        assert!(response.headers.first("missing").is_none());

        let flat = response.headers.flatten();
        assert!(flat.contains("server: nginx/1.24\n"));
        assert!(flat.contains("set-cookie: a=1; b=2\n"));
    }

    #[test]
    fn extract_title_decodes_entities_and_trims() {
        assert_eq!(
            extract_title("<title>Hello &amp; Welcome</title>"),
            "Hello & Welcome"
        );
        assert_eq!(
            extract_title("<TITLE lang=\"en\">Multi\nline</TITLE>"),
            "Multi\nline"
        );
        assert_eq!(extract_title("<html><body>no title</body></html>"), "");
        assert_eq!(extract_title(""), "");
    }

    #[test]
    fn match_patterns_is_case_insensitive() {
        let found = match_patterns(
            "X-Powered-By: Free Basics Gateway",
            &patterns(&["free basics", "zero rated", " ", ""]),
        );
        assert_eq!(found, vec!["free basics"]);
    }

    #[test]
    fn liveness_with_explicit_codes_is_exact_membership() {
        let codes = vec![200, 301];
        assert!(is_live(301, &codes));
        assert!(!is_live(404, &codes));
        assert!(!is_live(302, &codes));
    }

    #[test]
    fn liveness_without_codes_uses_range_rule() {
        assert!(is_live(200, &[]));
        assert!(is_live(399, &[]));
        assert!(!is_live(400, &[]));
        assert!(!is_live(0, &[]));
    }

    #[test]
    fn notes_collect_matches_and_captive_hint() {
        let response = sample_response();
        let options = ProbeOptions {
            header_patterns: patterns(&["nginx", "x-portal"]),
            body_patterns: patterns(&["welcome"]),
            ..ProbeOptions::default()
        };
        let notes = build_notes(
            &response.headers,
            &response.body,
            "http://captive.example.net/login",
            &options,
        );
        assert_eq!(
            notes,
            "header_matches=nginx;body_matches=welcome;redirect_hint=captive_portal"
        );
    }

    #[test]
    fn classify_extracts_title_only_for_html_with_capture() {
        let target = Target::new("www.example.com", Protocol::Http, String::new());
        let response = sample_response();

        let captured = classify_response(
            &target,
            &response,
            &ProbeOptions { capture_body: true, ..ProbeOptions::default() },
        );
        assert_eq!(captured.title, "Hello & Welcome");
        assert_eq!(captured.server, "nginx/1.24");
        // No content-length header, falls back to the downloaded size.
        assert_eq!(captured.content_length, 62);
        // No pre-resolved IP, falls back to the peer address.
        assert_eq!(captured.ip, "203.0.113.9");

        let uncaptured = classify_response(&target, &response, &ProbeOptions::default());
        assert_eq!(uncaptured.title, "");
    }

    #[test]
    fn classify_prefers_content_length_header_and_target_ip() {
        let mut response = sample_response();
        response.headers.push("Content-Length", "1234".to_string());
        let target = Target::new("www.example.com", Protocol::Http, "198.51.100.7".to_string());

        let result = classify_response(&target, &response, &ProbeOptions::default());
        assert_eq!(result.content_length, 1234);
        assert_eq!(result.ip, "198.51.100.7");
    }
}
