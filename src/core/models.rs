// src/core/models.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use strum::{Display, EnumString};

/// Identifying client string sent with every probe request.
pub const USER_AGENT: &str = concat!("VantageRS/", env!("CARGO_PKG_VERSION"));

/// Live status codes used by subdomain mode when none are configured.
pub const DEFAULT_LIVE_CODES: &[u16] = &[200, 204, 301, 302, 303, 307, 308, 401, 403];

/// The two schemes a target can be probed over. Each maps to a fixed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

/// HTTP method used for probing. POST may carry a body from `ProbeOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Serialization format of result files. The display form doubles as the
/// file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Csv,
    Json,
    Txt,
}

/// What to do when body patterns are configured but the method is HEAD:
/// skip body matching entirely, or silently upgrade the request to GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BodyPatternMode {
    Skip,
    Upgrade,
}

/// Controls what the progress line counts as "live": every completed
/// exchange, or only those passing the liveness predicate. Reporting only,
/// never affects what is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountLiveMode {
    Responsive,
    IsLiveOnly,
}

/// A single probe destination. Immutable once built; identified by
/// `(host, protocol, port)`.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub protocol: Protocol,
    pub port: u16,
    pub url: String,
    /// Pre-resolved address annotation, `;`-joined when a host has several.
    /// Empty when DNS pre-resolution was skipped or failed.
    pub ip: String,
}

impl Target {
    /// Builds a target for `host` over `protocol` on the protocol's default
    /// port. The host is lower-cased and trailing dots are trimmed so that
    /// dedup and resume comparisons are case- and trailing-dot-insensitive.
    pub fn new(host: &str, protocol: Protocol, ip: String) -> Self {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        let port = protocol.default_port();
        let url = format!("{}://{}/", protocol, host);
        Self { host, protocol, port, url, ip }
    }

    /// The lower-cased `host|protocol|port` key used for resume filtering.
    pub fn resume_key(&self) -> String {
        format!("{}|{}|{}", self.host, self.protocol, self.port)
    }
}

/// Expands hosts into one target per configured protocol, preserving host
/// order. IP annotations come from the resolver's map when present.
pub fn build_targets(
    hosts: &[String],
    protocols: &[Protocol],
    ip_map: &HashMap<String, String>,
) -> Vec<Target> {
    let mut targets = Vec::with_capacity(hosts.len() * protocols.len());
    for host in hosts {
        for protocol in protocols {
            let ip = ip_map.get(host).cloned().unwrap_or_default();
            targets.push(Target::new(host, *protocol, ip));
        }
    }
    targets
}

/// Terminal outcome of a target whose HTTP transaction completed, even on a
/// non-2xx status.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub host: String,
    pub protocol: Protocol,
    pub port: u16,
    pub ip: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub content_length: u64,
    pub server: String,
    pub title: String,
    pub redirect_url: String,
    /// `;`-joined classifier tags, e.g. `header_matches=x-portal`.
    pub notes: String,
    pub is_live: bool,
}

/// Terminal outcome of a target the transport layer could not complete.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub timestamp: String,
    pub host: String,
    /// Protocol label; `"dns"` for resolution failures logged before probing.
    pub protocol: String,
    pub port: Option<u16>,
    pub error: String,
    pub status_code: Option<u16>,
}

impl FailureRecord {
    /// A transport-level probe failure. An empty error text collapses to
    /// `NO_RESPONSE` so the fail log never carries a blank reason.
    pub fn transport(target: &Target, error: String, status_code: u16) -> Self {
        let error = if error.trim().is_empty() { "NO_RESPONSE".to_string() } else { error };
        Self {
            timestamp: now_rfc3339(),
            host: target.host.clone(),
            protocol: target.protocol.to_string(),
            port: Some(target.port),
            error,
            status_code: Some(status_code),
        }
    }

    /// A pre-probe DNS resolution failure for `host`.
    pub fn dns(host: &str) -> Self {
        Self {
            timestamp: now_rfc3339(),
            host: host.to_string(),
            protocol: "dns".to_string(),
            port: None,
            error: "DNS_NO_RECORD".to_string(),
            status_code: None,
        }
    }
}

fn now_rfc3339() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Per-run prober configuration, consumed read-only by the probe loop.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub concurrency: usize,
    pub method: HttpMethod,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Whether the body text is kept for title extraction and pattern checks.
    pub capture_body: bool,
    /// Upper bound on bytes read from any response body.
    pub max_body_size: usize,
    pub header_patterns: Vec<String>,
    pub body_patterns: Vec<String>,
    pub body_pattern_mode: BodyPatternMode,
    /// Exact live status codes; empty means the `200..400` range rule.
    pub live_codes: Vec<u16>,
    pub count_live_mode: CountLiveMode,
    pub post_data: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            concurrency: 50,
            method: HttpMethod::Get,
            timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(5),
            user_agent: USER_AGENT.to_string(),
            capture_body: false,
            max_body_size: 20_000,
            header_patterns: Vec::new(),
            body_patterns: Vec::new(),
            body_pattern_mode: BodyPatternMode::Skip,
            live_codes: Vec::new(),
            count_live_mode: CountLiveMode::Responsive,
            post_data: String::new(),
        }
    }
}

/// Running totals owned by the probe control loop and reported through the
/// progress callback after every terminal outcome.
#[derive(Debug, Clone, Copy)]
pub struct ProbeCounters {
    pub processed: usize,
    pub total: usize,
    pub live: usize,
    pub failed: usize,
}

impl ProbeCounters {
    pub fn new(total: usize) -> Self {
        Self { processed: 0, total, live: 0, failed: 0 }
    }
}

/// Options for a subdomain enumeration run, produced by the CLI layer.
#[derive(Debug, Clone)]
pub struct SubdomainConfig {
    pub domain: String,
    pub protocols: Vec<Protocol>,
    pub threads: usize,
    pub timeout: u64,
    pub wordlist: PathBuf,
    pub permutations: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub fail_log: Option<PathBuf>,
    pub live_codes: Vec<u16>,
    pub show_progress: bool,
    pub show_each: bool,
    pub show_warning: bool,
}

/// Options for a zero-rate host scan, produced by the CLI layer.
#[derive(Debug, Clone)]
pub struct ZeroRateConfig {
    pub hosts_file: Option<PathBuf>,
    pub domains: Vec<String>,
    pub domains_file: Option<PathBuf>,
    pub wordlist: PathBuf,
    pub protocols: Vec<Protocol>,
    pub threads: usize,
    pub timeout: u64,
    pub method: HttpMethod,
    pub post_data: String,
    pub dns_precheck: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub fail_log: Option<PathBuf>,
    pub header_patterns: Vec<String>,
    pub body_patterns: Vec<String>,
    pub body_pattern_mode: BodyPatternMode,
    pub show_progress: bool,
    pub show_each: bool,
    pub show_warning: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_normalizes_host_and_builds_url() {
        let target = Target::new("API.Example.COM.", Protocol::Https, String::new());
        assert_eq!(target.host, "api.example.com");
        assert_eq!(target.port, 443);
        assert_eq!(target.url, "https://api.example.com/");
        assert_eq!(target.resume_key(), "api.example.com|https|443");
    }

    #[test]
    fn build_targets_expands_protocols_in_order() {
        let hosts = vec!["www.example.com".to_string(), "api.example.com".to_string()];
        let mut ip_map = HashMap::new();
        ip_map.insert("www.example.com".to_string(), "93.184.216.34".to_string());

        let targets = build_targets(&hosts, &[Protocol::Http, Protocol::Https], &ip_map);
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[0].url, "http://www.example.com/");
        assert_eq!(targets[0].ip, "93.184.216.34");
        assert_eq!(targets[1].url, "https://www.example.com/");
        assert_eq!(targets[2].ip, "");
    }

    #[test]
    fn single_protocol_scenario_yields_one_target_per_host() {
        let hosts = vec!["www.example.com".to_string(), "api.example.com".to_string()];
        let targets = build_targets(&hosts, &[Protocol::Http], &HashMap::new());
        let urls: Vec<&str> = targets.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["http://www.example.com/", "http://api.example.com/"]);
    }

    #[test]
    fn failure_record_defaults_empty_error_to_no_response() {
        let target = Target::new("host.example.com", Protocol::Http, String::new());
        let record = FailureRecord::transport(&target, "  ".to_string(), 0);
        assert_eq!(record.error, "NO_RESPONSE");
        assert_eq!(record.status_code, Some(0));
        assert_eq!(record.protocol, "http");
    }

    #[test]
    fn enum_text_forms_round_trip() {
        assert_eq!(Protocol::Https.to_string(), "https");
        assert_eq!("HTTP".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!(HttpMethod::Head.to_string(), "HEAD");
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
