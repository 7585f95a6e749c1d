// src/core/runner.rs

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use color_eyre::eyre::{bail, Result};
use tracing::{info, warn};

use crate::core::candidates;
use crate::core::models::{
    build_targets, CountLiveMode, FailureRecord, HttpMethod, OutputFormat, ProbeOptions,
    SubdomainConfig, Target, ZeroRateConfig,
};
use crate::core::output::{
    default_output_path, prepare_output_path, result_record, FailLogger, ResultWriter,
    SUBDOMAIN_COLUMNS, ZERO_RATE_COLUMNS,
};
use crate::core::{prober, progress, resolver, resume};

fn print_safety_warning(mode_label: &str) {
    println!();
    println!("[!] SAFETY WARNING: {} is for educational and authorized testing only.", mode_label);
    println!("[!] Do not scan targets without explicit permission.");
    println!();
}

/// The fail log is optional and best-effort: failing to open it is reported
/// but never aborts a scan.
fn open_fail_logger(path: Option<&std::path::Path>) -> Option<FailLogger> {
    let path = path?;
    match FailLogger::open(path) {
        Ok(logger) => Some(logger),
        Err(e) => {
            warn!(error = %e, "Could not open fail log, continuing without it.");
            eprintln!("[!] {}", e);
            None
        }
    }
}

fn close_fail_logger(logger: Option<FailLogger>) -> Result<()> {
    if let Some(logger) = logger {
        logger.close()?;
    }
    Ok(())
}

fn apply_resume_filter(
    targets: Vec<Target>,
    resume_path: Option<&std::path::Path>,
    format: OutputFormat,
) -> Vec<Target> {
    let Some(path) = resume_path else { return targets };
    let keys = resume::load_resume_keys(path, format);
    let before = targets.len();
    let targets = resume::filter_targets(targets, &keys);
    info!(skipped = before - targets.len(), remaining = targets.len(), "Resume filter applied.");
    targets
}

/// Enumerates subdomains of one root domain: wordlist-driven candidates are
/// resolved, resume-filtered and probed over every configured protocol, with
/// live results streamed to the output file.
pub async fn run_subdomain_scan(config: SubdomainConfig) -> Result<()> {
    let domain = candidates::normalize_domain(&config.domain);
    if !candidates::is_valid_domain(&domain) {
        bail!("invalid domain: {:?}", config.domain);
    }

    if config.show_warning {
        print_safety_warning("Subdomain scan mode");
    }

    let mut words = candidates::read_wordlist(&config.wordlist);
    if words.is_empty() {
        bail!("wordlist empty or not found: {}", config.wordlist.display());
    }
    if config.permutations {
        words = candidates::with_permutations(words);
    }

    let hosts = candidates::build_candidates(&domain, &words);
    if hosts.is_empty() {
        bail!("no subdomain candidates generated");
    }
    info!(domain = %domain, candidates = hosts.len(), "Candidates generated.");
    println!("[i] Generated {} subdomain candidates. Resolving DNS...", hosts.len());

    let mut fail_logger = open_fail_logger(config.fail_log.as_deref());

    // Unresolved candidates are dropped from the scan but leave a trace in
    // the fail log.
    let resolution = resolver::resolve_hosts(&hosts, config.show_progress).await;
    for host in &resolution.unresolved {
        if let Some(logger) = fail_logger.as_mut() {
            if let Err(e) = logger.log(&FailureRecord::dns(host)) {
                warn!(error = %e, "Could not write fail log entry.");
            }
        }
    }
    if resolution.resolved.is_empty() {
        close_fail_logger(fail_logger)?;
        bail!("no subdomain candidates resolved");
    }

    let resolved_hosts: Vec<String> =
        resolution.resolved.iter().map(|(host, _)| host.clone()).collect();
    let ip_map: HashMap<String, String> = resolution.resolved.into_iter().collect();
    let targets = build_targets(&resolved_hosts, &config.protocols, &ip_map);

    let targets = apply_resume_filter(targets, config.resume.as_deref(), config.format);
    if targets.is_empty() {
        close_fail_logger(fail_logger)?;
        bail!("nothing left to scan, the resume file already covers these targets");
    }

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output_path("subdomains", &domain, config.format));
    let (output, append) = prepare_output_path(&output, config.format, false);
    let mut writer = match ResultWriter::create(&output, config.format, SUBDOMAIN_COLUMNS, append)
    {
        Ok(writer) => writer,
        Err(e) => {
            close_fail_logger(fail_logger)?;
            return Err(e);
        }
    };

    println!("[i] Probing {} targets with {} concurrent requests...", targets.len(), config.threads);

    let options = ProbeOptions {
        concurrency: config.threads,
        method: HttpMethod::Get,
        timeout: Duration::from_secs(config.timeout.max(1)),
        capture_body: true,
        live_codes: config.live_codes.clone(),
        count_live_mode: CountLiveMode::IsLiveOnly,
        ..ProbeOptions::default()
    };

    // With live codes configured only live targets make it into the results.
    let live_only = !config.live_codes.is_empty();
    let probe_outcome = prober::probe_targets(
        targets,
        &options,
        |result| {
            if live_only && !result.is_live {
                return;
            }
            if let Err(e) = writer.write(&result_record(&result, SUBDOMAIN_COLUMNS)) {
                warn!(error = %e, "Could not write result record.");
            }
            if config.show_each {
                println!(
                    "[+] {} ({}) {} {}",
                    result.host, result.protocol, result.status_code, result.server
                );
            }
        },
        |failure| {
            if let Some(logger) = fail_logger.as_mut() {
                if let Err(e) = logger.log(&failure) {
                    warn!(error = %e, "Could not write fail log entry.");
                }
            }
        },
        config
            .show_progress
            .then_some(progress::print_progress as fn(usize, usize, usize, usize)),
    )
    .await;

    writer.close()?;
    close_fail_logger(fail_logger)?;
    let counters = probe_outcome?;

    info!(
        processed = counters.processed,
        live = counters.live,
        failed = counters.failed,
        output = %output.display(),
        "Subdomain scan complete."
    );
    println!("[i] Subdomain scan complete. Results: {}", output.display());
    Ok(())
}

/// Gathers the zero-rate host set from either a host list file or root
/// domains joined with a wordlist.
fn zero_rate_hosts(config: &ZeroRateConfig) -> Vec<String> {
    if let Some(path) = &config.hosts_file {
        return candidates::read_wordlist(path);
    }

    let raw_domains = match &config.domains_file {
        Some(path) => candidates::read_wordlist(path),
        None => config.domains.clone(),
    };
    let domains: Vec<String> = raw_domains
        .iter()
        .map(|domain| candidates::normalize_domain(domain))
        .filter(|domain| candidates::is_valid_domain(domain))
        .collect();
    if domains.is_empty() {
        return Vec::new();
    }

    let words = candidates::read_wordlist(&config.wordlist);
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    for domain in &domains {
        for host in candidates::build_candidates(domain, &words) {
            if seen.insert(host.clone()) {
                hosts.push(host);
            }
        }
    }
    hosts
}

/// Probes a host set for zero-rated / walled-garden behavior: optional DNS
/// pre-check, resume filtering, then a fingerprint-aware probe pass where
/// every completed exchange is recorded.
pub async fn run_zero_rate_scan(config: ZeroRateConfig) -> Result<()> {
    if config.show_warning {
        print_safety_warning("Zero-rate scan mode");
    }

    let hosts = zero_rate_hosts(&config);
    if hosts.is_empty() {
        bail!("no hosts to scan, provide --hosts or --domain/--domains with --wordlist");
    }
    info!(hosts = hosts.len(), "Host set assembled.");

    let (hosts, ip_map) = if config.dns_precheck {
        println!("[i] DNS pre-check enabled. Resolving hosts...");
        let resolution = resolver::resolve_hosts(&hosts, config.show_progress).await;
        if resolution.resolved.is_empty() {
            bail!("no hosts resolved");
        }
        let hosts: Vec<String> =
            resolution.resolved.iter().map(|(host, _)| host.clone()).collect();
        let ip_map: HashMap<String, String> = resolution.resolved.into_iter().collect();
        (hosts, ip_map)
    } else {
        (hosts, HashMap::new())
    };

    let targets = build_targets(&hosts, &config.protocols, &ip_map);
    let targets = apply_resume_filter(targets, config.resume.as_deref(), config.format);
    if targets.is_empty() {
        bail!("nothing left to scan, the resume file already covers these targets");
    }

    let output = config
        .output
        .clone()
        .unwrap_or_else(|| default_output_path("zero_rate", "hosts", config.format));
    let (output, append) = prepare_output_path(&output, config.format, false);
    let mut writer = ResultWriter::create(&output, config.format, ZERO_RATE_COLUMNS, append)?;

    let mut fail_logger = open_fail_logger(config.fail_log.as_deref());

    println!("[i] Probing {} targets with {} concurrent requests...", targets.len(), config.threads);

    let options = ProbeOptions {
        concurrency: config.threads,
        method: config.method,
        timeout: Duration::from_secs(config.timeout.max(1)),
        capture_body: !config.body_patterns.is_empty() || config.method == HttpMethod::Get,
        header_patterns: config.header_patterns.clone(),
        body_patterns: config.body_patterns.clone(),
        body_pattern_mode: config.body_pattern_mode,
        count_live_mode: CountLiveMode::Responsive,
        post_data: config.post_data.clone(),
        ..ProbeOptions::default()
    };

    let probe_outcome = prober::probe_targets(
        targets,
        &options,
        |result| {
            if let Err(e) = writer.write(&result_record(&result, ZERO_RATE_COLUMNS)) {
                warn!(error = %e, "Could not write result record.");
            }
            if config.show_each {
                println!(
                    "[+] {} ({}) {} {}ms",
                    result.host, result.protocol, result.status_code, result.response_time_ms
                );
            }
        },
        |failure| {
            if let Some(logger) = fail_logger.as_mut() {
                if let Err(e) = logger.log(&failure) {
                    warn!(error = %e, "Could not write fail log entry.");
                }
            }
        },
        config
            .show_progress
            .then_some(progress::print_progress as fn(usize, usize, usize, usize)),
    )
    .await;

    writer.close()?;
    close_fail_logger(fail_logger)?;
    let counters = probe_outcome?;

    info!(
        processed = counters.processed,
        live = counters.live,
        failed = counters.failed,
        output = %output.display(),
        "Zero-rate scan complete."
    );
    println!("[i] Zero-rate scan complete. Results: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{OutputFormat, Protocol};
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vantage_runner_{}_{}", std::process::id(), name))
    }

    fn zero_rate_config() -> ZeroRateConfig {
        ZeroRateConfig {
            hosts_file: None,
            domains: Vec::new(),
            domains_file: None,
            wordlist: PathBuf::from("/nonexistent/wordlist.txt"),
            protocols: vec![Protocol::Http],
            threads: 10,
            timeout: 8,
            method: HttpMethod::Head,
            post_data: String::new(),
            dns_precheck: false,
            format: OutputFormat::Csv,
            output: None,
            resume: None,
            fail_log: None,
            header_patterns: Vec::new(),
            body_patterns: Vec::new(),
            body_pattern_mode: crate::core::models::BodyPatternMode::Skip,
            show_progress: false,
            show_each: false,
            show_warning: false,
        }
    }

    #[test]
    fn zero_rate_hosts_from_file_and_domains() {
        let hosts_path = temp_path("hosts.txt");
        fs::write(&hosts_path, "One.Example.COM\n# skip\ntwo.example.com\n").unwrap();
        let config = ZeroRateConfig { hosts_file: Some(hosts_path.clone()), ..zero_rate_config() };
        assert_eq!(zero_rate_hosts(&config), vec!["one.example.com", "two.example.com"]);
        fs::remove_file(&hosts_path).ok();

        let words_path = temp_path("words.txt");
        fs::write(&words_path, "www\napi\n").unwrap();
        let config = ZeroRateConfig {
            domains: vec!["example.com".to_string(), "not a domain".to_string()],
            wordlist: words_path.clone(),
            ..zero_rate_config()
        };
        assert_eq!(
            zero_rate_hosts(&config),
            vec!["www.example.com", "api.example.com"]
        );
        fs::remove_file(&words_path).ok();
    }

    #[tokio::test]
    async fn invalid_domain_aborts_subdomain_scan() {
        let config = SubdomainConfig {
            domain: "not a domain".to_string(),
            protocols: vec![Protocol::Http],
            threads: 10,
            timeout: 8,
            wordlist: PathBuf::from("/nonexistent/wordlist.txt"),
            permutations: false,
            format: OutputFormat::Csv,
            output: None,
            resume: None,
            fail_log: None,
            live_codes: Vec::new(),
            show_progress: false,
            show_each: false,
            show_warning: false,
        };
        let error = run_subdomain_scan(config).await.unwrap_err();
        assert!(error.to_string().contains("invalid domain"));
    }

    #[tokio::test]
    async fn empty_host_set_aborts_zero_rate_scan() {
        let error = run_zero_rate_scan(zero_rate_config()).await.unwrap_err();
        assert!(error.to_string().contains("no hosts to scan"));
    }
}
