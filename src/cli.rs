// src/cli.rs

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{bail, Result};

use crate::core::classify::{DEFAULT_BODY_PATTERNS, DEFAULT_HEADER_PATTERNS};
use crate::core::models::{
    BodyPatternMode, HttpMethod, OutputFormat, Protocol, SubdomainConfig, ZeroRateConfig,
    DEFAULT_LIVE_CODES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    #[value(alias = "subdomains")]
    Subdomain,
    #[value(alias = "zerorate", alias = "zero_rate")]
    ZeroRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
    Txt,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Txt => OutputFormat::Txt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Head,
    Post,
}

impl From<MethodArg> for HttpMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Get => HttpMethod::Get,
            MethodArg::Head => HttpMethod::Head,
            MethodArg::Post => HttpMethod::Post,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BodyPatternModeArg {
    Skip,
    Upgrade,
}

impl From<BodyPatternModeArg> for BodyPatternMode {
    fn from(value: BodyPatternModeArg) -> Self {
        match value {
            BodyPatternModeArg::Skip => BodyPatternMode::Skip,
            BodyPatternModeArg::Upgrade => BodyPatternMode::Upgrade,
        }
    }
}

/// Flag surface shared by both scan modes. Turning parsed flags into the
/// mode config structs is a pure function with no side effects; everything
/// stateful lives in the core pipeline.
#[derive(Debug, Parser)]
#[command(
    name = "vantage",
    version,
    about = "Concurrent HTTP host prober for authorized reconnaissance"
)]
pub struct Cli {
    /// Scan mode; usage help is printed when omitted
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Root domain (subdomain mode) or comma-separated root domains
    /// (zero-rate mode)
    #[arg(long)]
    pub domain: Option<String>,

    /// File with root domains, one per line (zero-rate mode)
    #[arg(long)]
    pub domains: Option<PathBuf>,

    /// File with hostnames to probe, one per line (zero-rate mode)
    #[arg(long)]
    pub hosts: Option<PathBuf>,

    /// Subdomain wordlist file
    #[arg(long, default_value = "wordlists/subdomains_default.txt")]
    pub wordlist: PathBuf,

    /// Protocols to probe: http, https, both, or a comma list
    #[arg(long, default_value = "both")]
    pub protocols: String,

    /// Concurrent in-flight requests (default: 50 subdomain, 100 zero-rate)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 8)]
    pub timeout: u64,

    /// HTTP method for zero-rate probing
    #[arg(long, value_enum, default_value_t = MethodArg::Head)]
    pub method: MethodArg,

    /// POST body sent when --method=post
    #[arg(long, default_value = "")]
    pub post_data: String,

    /// Output file path (default: results/<prefix>_<name>_<stamp>.<format>)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output serialization format
    #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
    pub format: FormatArg,

    /// Previous results file whose targets are skipped this run
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Append failed requests to this csv log
    #[arg(long)]
    pub fail_log: Option<PathBuf>,

    /// Add common subdomain permutations to the wordlist
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub permutations: bool,

    /// Comma-separated status codes overriding the live set (subdomain mode)
    #[arg(long)]
    pub live_codes: Option<String>,

    /// Resolve hosts before probing and drop the unresolvable ones
    /// (zero-rate mode)
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub dns: bool,

    /// Enable the built-in zero-rate patterns with --fingerprints=default
    #[arg(long)]
    pub fingerprints: Option<String>,

    /// Comma-separated header substring patterns
    #[arg(long)]
    pub header_patterns: Option<String>,

    /// Comma-separated body substring patterns
    #[arg(long)]
    pub body_patterns: Option<String>,

    /// With --method=head and body patterns: skip body checks or upgrade
    /// the request to GET
    #[arg(long, value_enum, default_value_t = BodyPatternModeArg::Skip)]
    pub body_pattern_mode: BodyPatternModeArg,

    /// Print each recorded result as it arrives
    #[arg(long, action = ArgAction::SetTrue)]
    pub show_each: bool,

    /// Print the in-place progress line
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub show_progress: bool,

    /// Print the authorized-use warning banner
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub show_warning: bool,
}

impl Cli {
    pub fn subdomain_config(&self) -> Result<SubdomainConfig> {
        let Some(domain) = self.domain.clone() else {
            bail!("subdomain mode requires --domain");
        };

        let live_codes = match &self.live_codes {
            Some(value) => {
                let parsed = parse_live_codes(value);
                if parsed.is_empty() { DEFAULT_LIVE_CODES.to_vec() } else { parsed }
            }
            None => DEFAULT_LIVE_CODES.to_vec(),
        };

        Ok(SubdomainConfig {
            domain,
            protocols: parse_protocols(&self.protocols),
            threads: self.threads.unwrap_or(50).max(1),
            timeout: self.timeout.max(1),
            wordlist: self.wordlist.clone(),
            permutations: self.permutations,
            format: self.format.into(),
            output: self.output.clone(),
            resume: self.resume.clone(),
            fail_log: self.fail_log.clone(),
            live_codes,
            show_progress: self.show_progress,
            show_each: self.show_each,
            show_warning: self.show_warning,
        })
    }

    pub fn zero_rate_config(&self) -> Result<ZeroRateConfig> {
        if self.hosts.is_none() && self.domain.is_none() && self.domains.is_none() {
            bail!("zero-rate mode requires --hosts, or --domain/--domains with --wordlist");
        }

        // Named fingerprint sets seed the patterns, explicit flags override.
        let mut header_patterns = Vec::new();
        let mut body_patterns = Vec::new();
        if self.fingerprints.as_deref() == Some("default") {
            header_patterns = DEFAULT_HEADER_PATTERNS.iter().map(|p| p.to_string()).collect();
            body_patterns = DEFAULT_BODY_PATTERNS.iter().map(|p| p.to_string()).collect();
        }
        if let Some(value) = &self.header_patterns {
            header_patterns = parse_list(value);
        }
        if let Some(value) = &self.body_patterns {
            body_patterns = parse_list(value);
        }

        Ok(ZeroRateConfig {
            hosts_file: self.hosts.clone(),
            domains: self.domain.as_deref().map(parse_list).unwrap_or_default(),
            domains_file: self.domains.clone(),
            wordlist: self.wordlist.clone(),
            protocols: parse_protocols(&self.protocols),
            threads: self.threads.unwrap_or(100).max(1),
            timeout: self.timeout.max(1),
            method: self.method.into(),
            post_data: self.post_data.clone(),
            dns_precheck: self.dns,
            format: self.format.into(),
            output: self.output.clone(),
            resume: self.resume.clone(),
            fail_log: self.fail_log.clone(),
            header_patterns,
            body_patterns,
            body_pattern_mode: self.body_pattern_mode.into(),
            show_progress: self.show_progress,
            show_each: self.show_each,
            show_warning: self.show_warning,
        })
    }
}

/// Splits a comma-separated flag value, trimming and deduplicating while
/// keeping first-seen order.
fn parse_list(value: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if seen.insert(part.to_string()) {
            items.push(part.to_string());
        }
    }
    items
}

/// `both`, an empty value or a list without a single valid entry all fall
/// back to probing http and https.
fn parse_protocols(value: &str) -> Vec<Protocol> {
    let value = value.trim().to_lowercase();
    if value.is_empty() || value == "both" {
        return vec![Protocol::Http, Protocol::Https];
    }

    let mut protocols = Vec::new();
    for part in parse_list(&value) {
        if let Ok(protocol) = part.parse::<Protocol>() {
            if !protocols.contains(&protocol) {
                protocols.push(protocol);
            }
        }
    }
    if protocols.is_empty() {
        vec![Protocol::Http, Protocol::Https]
    } else {
        protocols
    }
}

fn parse_live_codes(value: &str) -> Vec<u16> {
    parse_list(value)
        .iter()
        .filter_map(|code| code.parse::<u16>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vantage").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn protocols_parse_both_lists_and_garbage() {
        assert_eq!(parse_protocols("both"), vec![Protocol::Http, Protocol::Https]);
        assert_eq!(parse_protocols("https"), vec![Protocol::Https]);
        assert_eq!(parse_protocols("https, http"), vec![Protocol::Https, Protocol::Http]);
        assert_eq!(parse_protocols("gopher,ftp"), vec![Protocol::Http, Protocol::Https]);
    }

    #[test]
    fn subdomain_config_defaults() {
        let cli = parse(&["--mode", "subdomain", "--domain", "example.com"]);
        let config = cli.subdomain_config().unwrap();
        assert_eq!(config.domain, "example.com");
        assert_eq!(config.threads, 50);
        assert_eq!(config.timeout, 8);
        assert!(config.permutations);
        assert_eq!(config.live_codes, DEFAULT_LIVE_CODES.to_vec());
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn subdomain_config_requires_domain() {
        let cli = parse(&["--mode", "subdomain"]);
        assert!(cli.subdomain_config().is_err());
    }

    #[test]
    fn live_codes_override_and_fall_back() {
        let cli = parse(&[
            "--mode", "subdomain", "--domain", "example.com", "--live-codes", "200, 301,nope",
        ]);
        assert_eq!(cli.subdomain_config().unwrap().live_codes, vec![200, 301]);

        let cli = parse(&[
            "--mode", "subdomain", "--domain", "example.com", "--live-codes", "nope",
        ]);
        assert_eq!(cli.subdomain_config().unwrap().live_codes, DEFAULT_LIVE_CODES.to_vec());
    }

    #[test]
    fn zero_rate_fingerprints_seed_then_flags_override() {
        let cli = parse(&[
            "--mode", "zero-rate", "--hosts", "hosts.txt", "--fingerprints", "default",
        ]);
        let config = cli.zero_rate_config().unwrap();
        assert_eq!(config.threads, 100);
        assert_eq!(config.method, HttpMethod::Head);
        assert!(config.header_patterns.iter().any(|p| p == "x-zero-rated"));
        assert!(config.body_patterns.iter().any(|p| p == "walled garden"));

        let cli = parse(&[
            "--mode", "zero-rate", "--hosts", "hosts.txt", "--fingerprints", "default",
            "--body-patterns", "custom one,custom two",
        ]);
        let config = cli.zero_rate_config().unwrap();
        assert!(config.header_patterns.iter().any(|p| p == "x-zero-rated"));
        assert_eq!(config.body_patterns, vec!["custom one", "custom two"]);
    }

    #[test]
    fn zero_rate_requires_an_input_source() {
        let cli = parse(&["--mode", "zero-rate"]);
        assert!(cli.zero_rate_config().is_err());

        let cli = parse(&["--mode", "zero-rate", "--domain", "example.com,example.org"]);
        let config = cli.zero_rate_config().unwrap();
        assert_eq!(config.domains, vec!["example.com", "example.org"]);
    }

    #[test]
    fn boolean_flags_accept_explicit_values() {
        let cli = parse(&[
            "--mode", "subdomain", "--domain", "example.com", "--permutations", "false",
            "--show-progress", "false", "--show-each",
        ]);
        let config = cli.subdomain_config().unwrap();
        assert!(!config.permutations);
        assert!(!config.show_progress);
        assert!(config.show_each);
    }
}
