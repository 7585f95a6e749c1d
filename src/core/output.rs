// src/core/output.rs

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use color_eyre::eyre::{Result, WrapErr};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::core::models::{FailureRecord, OutputFormat, ProbeResult};

/// Result columns for subdomain mode; order is part of the file contract.
pub const SUBDOMAIN_COLUMNS: &[&str] = &[
    "host", "ip", "protocol", "port", "status_code", "response_time_ms", "server", "title",
    "redirect_url",
];

/// Result columns for zero-rate mode; order is part of the file contract.
pub const ZERO_RATE_COLUMNS: &[&str] = &[
    "host", "protocol", "port", "status_code", "response_time_ms", "content_length", "server",
    "title", "redirect_url", "notes",
];

/// Columns of the failure log.
pub const FAIL_LOG_COLUMNS: &[&str] =
    &["timestamp", "host", "protocol", "port", "error", "status_code"];

/// One output row: column name plus value, already in schema order. JSON
/// objects are emitted in exactly this order, csv/txt rows are stringified
/// from it.
pub type Record = Vec<(&'static str, Value)>;

/// Projects a probe result onto a column schema.
pub fn result_record(result: &ProbeResult, columns: &'static [&'static str]) -> Record {
    columns
        .iter()
        .map(|&column| {
            let value = match column {
                "host" => Value::String(result.host.clone()),
                "ip" => Value::String(result.ip.clone()),
                "protocol" => Value::String(result.protocol.to_string()),
                "port" => Value::from(result.port),
                "status_code" => Value::from(result.status_code),
                "response_time_ms" => Value::from(result.response_time_ms),
                "content_length" => Value::from(result.content_length),
                "server" => Value::String(result.server.clone()),
                "title" => Value::String(result.title.clone()),
                "redirect_url" => Value::String(result.redirect_url.clone()),
                "notes" => Value::String(result.notes.clone()),
                _ => Value::String(String::new()),
            };
            (column, value)
        })
        .collect()
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_object(record: &Record) -> String {
    let mut text = String::from("{");
    for (i, (name, value)) in record.iter().enumerate() {
        if i > 0 {
            text.push(',');
        }
        text.push_str(&format!("\"{}\":{}", name, value));
    }
    text.push('}');
    text
}

enum Backend {
    Csv(csv::Writer<File>),
    Txt(BufWriter<File>),
    Json { out: BufWriter<File>, first: bool },
}

/// Streaming result writer. Records are appended one at a time and the file
/// is left parseable once `close` runs, even with zero records written.
pub struct ResultWriter {
    backend: Backend,
}

impl ResultWriter {
    /// Opens `path` for the given format and writes the schema header (csv
    /// row, txt `# ` comment, json opening bracket). Parent directories are
    /// created as needed.
    pub fn create(
        path: &Path,
        format: OutputFormat,
        columns: &'static [&'static str],
        append: bool,
    ) -> Result<Self> {
        ensure_parent_dir(path)?;
        let file = open_output(path, append)
            .wrap_err_with(|| format!("could not open output file: {}", path.display()))?;

        let backend = match format {
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(file);
                if !append {
                    writer.write_record(columns)?;
                    writer.flush()?;
                }
                Backend::Csv(writer)
            }
            OutputFormat::Txt => {
                let mut out = BufWriter::new(file);
                if !append {
                    writeln!(out, "# {}", columns.join("\t"))?;
                    out.flush()?;
                }
                Backend::Txt(out)
            }
            OutputFormat::Json => {
                // A json array cannot be re-entered, so even "append" starts
                // a fresh array; callers redirect via prepare_output_path.
                let mut out = BufWriter::new(file);
                write!(out, "[")?;
                out.flush()?;
                Backend::Json { out, first: true }
            }
        };

        debug!(path = %path.display(), %format, "Result writer opened.");
        Ok(Self { backend })
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        match &mut self.backend {
            Backend::Csv(writer) => {
                writer.write_record(record.iter().map(|(_, value)| field_text(value)))?;
                writer.flush()?;
            }
            Backend::Txt(out) => {
                let row: Vec<String> = record.iter().map(|(_, value)| field_text(value)).collect();
                writeln!(out, "{}", row.join("\t"))?;
                out.flush()?;
            }
            Backend::Json { out, first } => {
                if !*first {
                    write!(out, ",")?;
                }
                write!(out, "{}", json_object(record))?;
                out.flush()?;
                *first = false;
            }
        }
        Ok(())
    }

    /// Finalizes the file; json gets its closing bracket here.
    pub fn close(mut self) -> Result<()> {
        match &mut self.backend {
            Backend::Csv(writer) => writer.flush()?,
            Backend::Txt(out) => out.flush()?,
            Backend::Json { out, .. } => {
                write!(out, "]")?;
                out.flush()?;
            }
        }
        Ok(())
    }
}

/// Append-only csv failure log. The header row is written only when the file
/// did not previously exist.
pub struct FailLogger {
    writer: csv::Writer<File>,
}

impl FailLogger {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("could not open fail log: {}", path.display()))?;

        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(FAIL_LOG_COLUMNS)?;
            writer.flush()?;
        }
        Ok(Self { writer })
    }

    pub fn log(&mut self, record: &FailureRecord) -> Result<()> {
        let port = record.port.map(|p| p.to_string()).unwrap_or_default();
        let status = record.status_code.map(|c| c.to_string()).unwrap_or_default();
        self.writer.write_record([
            record.timestamp.as_str(),
            record.host.as_str(),
            record.protocol.as_str(),
            port.as_str(),
            record.error.as_str(),
            status.as_str(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Default result path: `results/<prefix>_<sanitized-name>_<stamp>.<format>`.
pub fn default_output_path(prefix: &str, name: &str, format: OutputFormat) -> PathBuf {
    static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").unwrap());
    let safe = UNSAFE_CHARS.replace_all(name, "_");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from("results").join(format!("{}_{}_{}.{}", prefix, safe, stamp, format))
}

/// Resolves the effective output path. Appending to an existing json file is
/// not possible (the array is already closed), so that case redirects to a
/// fresh `_new`-suffixed path instead.
pub fn prepare_output_path(path: &Path, format: OutputFormat, append: bool) -> (PathBuf, bool) {
    if format == OutputFormat::Json && append && path.exists() {
        let text = path.to_string_lossy();
        let stem = text
            .strip_suffix(".json")
            .or_else(|| text.strip_suffix(".JSON"))
            .unwrap_or(&text);
        return (PathBuf::from(format!("{}_new.json", stem)), false);
    }
    (path.to_path_buf(), append)
}

fn open_output(path: &Path, append: bool) -> std::io::Result<File> {
    if append {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        File::create(path)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("could not create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}
