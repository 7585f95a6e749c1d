// src/core/resume.rs

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::models::{OutputFormat, Target};

const KEY_FIELDS: [&str; 3] = ["host", "protocol", "port"];

/// Loads the `(host, protocol, port)` keys of a previous results file.
///
/// Each format is parsed through its declared shape: csv by header-name
/// lookup, json as an array of objects, txt by its `# ` header comment (with
/// a positional first-three-columns fallback). Malformed rows are skipped
/// rather than aborting the load; a missing file yields an empty set.
pub fn load_resume_keys(path: &Path, format: OutputFormat) -> HashSet<String> {
    if !path.is_file() {
        return HashSet::new();
    }

    let keys = match format {
        OutputFormat::Csv => load_csv(path),
        OutputFormat::Json => load_json(path),
        OutputFormat::Txt => load_txt(path),
    };

    debug!(path = %path.display(), count = keys.len(), "Resume keys loaded.");
    keys
}

/// Drops targets already covered by `keys`, preserving order. An empty key
/// set passes everything through.
pub fn filter_targets(targets: Vec<Target>, keys: &HashSet<String>) -> Vec<Target> {
    if keys.is_empty() {
        return targets;
    }
    targets
        .into_iter()
        .filter(|target| !keys.contains(&target.resume_key()))
        .collect()
}

fn make_key(host: &str, protocol: &str, port: &str) -> String {
    format!(
        "{}|{}|{}",
        host.trim().to_lowercase(),
        protocol.trim().to_lowercase(),
        port.trim().to_lowercase()
    )
}

fn load_csv(path: &Path) -> HashSet<String> {
    let mut keys = HashSet::new();
    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not open resume file.");
            return keys;
        }
    };

    let positions: Vec<Option<usize>> = match reader.headers() {
        Ok(headers) => KEY_FIELDS
            .iter()
            .map(|field| headers.iter().position(|name| name == *field))
            .collect(),
        Err(_) => return keys,
    };

    for record in reader.records() {
        let Ok(record) = record else { continue };
        let field = |i: usize| {
            positions[i]
                .and_then(|pos| record.get(pos))
                .unwrap_or_default()
        };
        keys.insert(make_key(field(0), field(1), field(2)));
    }
    keys
}

/// One row of a json results file; extra fields are ignored and missing key
/// fields default to null.
#[derive(Debug, Deserialize)]
struct ResumeRow {
    #[serde(default)]
    host: Value,
    #[serde(default)]
    protocol: Value,
    #[serde(default)]
    port: Value,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn load_json(path: &Path) -> HashSet<String> {
    let mut keys = HashSet::new();
    let Ok(contents) = fs::read_to_string(path) else {
        return keys;
    };
    let Ok(rows) = serde_json::from_str::<Vec<Value>>(&contents) else {
        warn!(path = %path.display(), "Resume file is not a json array, ignoring.");
        return keys;
    };

    for row in rows {
        let Ok(row) = serde_json::from_value::<ResumeRow>(row) else { continue };
        keys.insert(make_key(
            &value_text(&row.host),
            &value_text(&row.protocol),
            &value_text(&row.port),
        ));
    }
    keys
}

fn load_txt(path: &Path) -> HashSet<String> {
    let mut keys = HashSet::new();
    let Ok(contents) = fs::read_to_string(path) else {
        return keys;
    };

    // The leading `# ` comment names the columns; without one the key fields
    // are assumed to sit in the first three columns.
    let mut columns: Option<Vec<String>> = None;
    for line in contents.lines() {
        if let Some(comment) = line.strip_prefix('#') {
            if columns.is_none() {
                let names: Vec<String> =
                    comment.trim().split('\t').map(|name| name.trim().to_string()).collect();
                if names.iter().any(|name| name == "host") {
                    columns = Some(names);
                }
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        let field = |name: &str, fallback: usize| -> &str {
            let index = match &columns {
                Some(columns) => match columns.iter().position(|c| c == name) {
                    Some(index) => index,
                    None => return "",
                },
                None => fallback,
            };
            parts.get(index).copied().unwrap_or_default()
        };
        keys.insert(make_key(field("host", 0), field("protocol", 1), field("port", 2)));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{build_targets, Protocol};
    use crate::core::output::{
        result_record, ResultWriter, SUBDOMAIN_COLUMNS, ZERO_RATE_COLUMNS,
    };
    use crate::core::models::ProbeResult;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vantage_resume_{}_{}", std::process::id(), name))
    }

    fn sample_result(host: &str, protocol: Protocol) -> ProbeResult {
        ProbeResult {
            host: host.to_string(),
            protocol,
            port: protocol.default_port(),
            ip: "192.0.2.1".to_string(),
            status_code: 200,
            response_time_ms: 5,
            content_length: 0,
            server: String::new(),
            title: String::new(),
            redirect_url: String::new(),
            notes: String::new(),
            is_live: true,
        }
    }

    #[test]
    fn round_trip_recovers_keys_in_every_format() {
        for (format, name) in [
            (OutputFormat::Csv, "round.csv"),
            (OutputFormat::Json, "round.json"),
            (OutputFormat::Txt, "round.txt"),
        ] {
            let path = temp_path(name);
            let mut writer =
                ResultWriter::create(&path, format, SUBDOMAIN_COLUMNS, false).unwrap();
            writer
                .write(&result_record(&sample_result("www.example.com", Protocol::Http), SUBDOMAIN_COLUMNS))
                .unwrap();
            writer
                .write(&result_record(&sample_result("api.example.com", Protocol::Https), SUBDOMAIN_COLUMNS))
                .unwrap();
            writer.close().unwrap();

            let keys = load_resume_keys(&path, format);
            fs::remove_file(&path).ok();
            let expected: HashSet<String> = [
                "www.example.com|http|80".to_string(),
                "api.example.com|https|443".to_string(),
            ]
            .into();
            assert_eq!(keys, expected, "format {format} lost keys");
        }
    }

    #[test]
    fn zero_rate_txt_schema_round_trips_too() {
        let path = temp_path("zr.txt");
        let mut writer =
            ResultWriter::create(&path, OutputFormat::Txt, ZERO_RATE_COLUMNS, false).unwrap();
        writer
            .write(&result_record(&sample_result("portal.example.net", Protocol::Http), ZERO_RATE_COLUMNS))
            .unwrap();
        writer.close().unwrap();

        let keys = load_resume_keys(&path, OutputFormat::Txt);
        fs::remove_file(&path).ok();
        assert!(keys.contains("portal.example.net|http|80"));
    }

    #[test]
    fn rerun_against_same_targets_leaves_nothing() {
        let hosts = vec!["www.example.com".to_string(), "api.example.com".to_string()];
        let targets =
            build_targets(&hosts, &[Protocol::Http, Protocol::Https], &HashMap::new());

        let path = temp_path("full.csv");
        let mut writer =
            ResultWriter::create(&path, OutputFormat::Csv, SUBDOMAIN_COLUMNS, false).unwrap();
        for target in &targets {
            writer
                .write(&result_record(&sample_result(&target.host, target.protocol), SUBDOMAIN_COLUMNS))
                .unwrap();
        }
        writer.close().unwrap();

        let keys = load_resume_keys(&path, OutputFormat::Csv);
        fs::remove_file(&path).ok();
        let remaining = filter_targets(targets, &keys);
        assert!(remaining.is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let path = temp_path("mixed.json");
        fs::write(
            &path,
            r#"[{"host":"ok.example.com","protocol":"http","port":80},"not an object",42]"#,
        )
        .unwrap();
        let keys = load_resume_keys(&path, OutputFormat::Json);
        fs::remove_file(&path).ok();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("ok.example.com|http|80"));

        let path = temp_path("garbage.json");
        fs::write(&path, "{ definitely not json").unwrap();
        assert!(load_resume_keys(&path, OutputFormat::Json).is_empty());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn txt_without_header_falls_back_to_positional_columns() {
        let path = temp_path("bare.txt");
        fs::write(&path, "www.example.com\thttp\t80\textra\n\n").unwrap();
        let keys = load_resume_keys(&path, OutputFormat::Txt);
        fs::remove_file(&path).ok();
        assert!(keys.contains("www.example.com|http|80"));
    }

    #[test]
    fn missing_file_yields_empty_set() {
        assert!(load_resume_keys(Path::new("/nonexistent/vantage.csv"), OutputFormat::Csv).is_empty());
    }

    #[test]
    fn filter_is_case_insensitive() {
        let targets = build_targets(
            &["WWW.Example.COM".to_string()],
            &[Protocol::Http],
            &HashMap::new(),
        );
        let keys: HashSet<String> = ["www.example.com|http|80".to_string()].into();
        assert!(filter_targets(targets, &keys).is_empty());
    }
}
