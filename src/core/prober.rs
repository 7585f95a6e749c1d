// src/core/prober.rs

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::{Result, WrapErr};
use futures::{stream, StreamExt};
use reqwest::{redirect, Client, Response};
use tracing::{debug, info};

use crate::core::classify::{self, HeaderBag, RawResponse};
use crate::core::models::{
    BodyPatternMode, CountLiveMode, FailureRecord, HttpMethod, ProbeCounters, ProbeOptions,
    ProbeResult, Target,
};

/// A transport-level failure; `status` is the code seen before the exchange
/// broke down, 0 when nothing was received.
#[derive(Debug)]
struct ExchangeError {
    error: String,
    status: u16,
}

struct Exchange {
    target: Target,
    outcome: std::result::Result<RawResponse, ExchangeError>,
}

/// Probes every target exactly once and invokes exactly one of `on_result` /
/// `on_fail` per target, plus `on_progress` after each terminal outcome.
///
/// Up to `concurrency` exchanges are in flight at a time; targets are
/// admitted in order as slots free up. Completions are consumed one at a
/// time on this task, so the callbacks never run concurrently and may own
/// the output sinks without locking.
pub async fn probe_targets<R, F, P>(
    targets: Vec<Target>,
    options: &ProbeOptions,
    mut on_result: R,
    mut on_fail: F,
    mut on_progress: Option<P>,
) -> Result<ProbeCounters>
where
    R: FnMut(ProbeResult),
    F: FnMut(FailureRecord),
    P: FnMut(usize, usize, usize, usize),
{
    let options = Arc::new(apply_body_pattern_mode(options.clone()));
    let concurrency = options.concurrency.max(1);
    let client = build_client(&options)?;
    let total = targets.len();
    let mut counters = ProbeCounters::new(total);

    info!(total, concurrency, method = %options.method, "Probe loop starting.");

    let mut exchanges = stream::iter(targets.into_iter().map(|target| {
        let client = client.clone();
        let options = Arc::clone(&options);
        async move { execute_exchange(&client, target, &options).await }
    }))
    .buffer_unordered(concurrency);

    while let Some(exchange) = exchanges.next().await {
        match exchange.outcome {
            Ok(response) => {
                let result = classify::classify_response(&exchange.target, &response, &options);
                let counts_as_live = match options.count_live_mode {
                    CountLiveMode::IsLiveOnly => result.is_live,
                    CountLiveMode::Responsive => true,
                };
                on_result(result);
                if counts_as_live {
                    counters.live += 1;
                }
            }
            Err(failure) => {
                debug!(host = %exchange.target.host, error = %failure.error, "Exchange failed.");
                counters.failed += 1;
                on_fail(FailureRecord::transport(
                    &exchange.target,
                    failure.error,
                    failure.status,
                ));
            }
        }

        counters.processed += 1;
        if let Some(progress) = on_progress.as_mut() {
            progress(counters.processed, counters.total, counters.live, counters.failed);
        }
    }

    info!(
        processed = counters.processed,
        live = counters.live,
        failed = counters.failed,
        "Probe loop finished."
    );
    Ok(counters)
}

/// Body patterns need a body: a HEAD probe is silently promoted to GET with
/// capture when the mode says upgrade; with skip, body matching just never
/// fires because no body is read.
fn apply_body_pattern_mode(mut options: ProbeOptions) -> ProbeOptions {
    if options.method == HttpMethod::Head
        && !options.body_patterns.is_empty()
        && options.body_pattern_mode == BodyPatternMode::Upgrade
    {
        debug!("Promoting HEAD to GET for body pattern matching.");
        options.method = HttpMethod::Get;
        options.capture_body = true;
    }
    options
}

/// One shared client for the whole run. Certificate and hostname checks are
/// disabled on purpose: misconfigured and self-signed endpoints are exactly
/// what a reconnaissance probe needs to reach. Redirects are observed via
/// the `location` header, never followed.
fn build_client(options: &ProbeOptions) -> Result<Client> {
    Client::builder()
        .user_agent(options.user_agent.clone())
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .redirect(redirect::Policy::none())
        .danger_accept_invalid_certs(true)
        .build()
        .wrap_err("failed to build HTTP client")
}

async fn execute_exchange(client: &Client, target: Target, options: &ProbeOptions) -> Exchange {
    let started = Instant::now();

    let mut request = client.request(options.method.as_reqwest(), &target.url);
    if options.method == HttpMethod::Post && !options.post_data.is_empty() {
        request = request.body(options.post_data.clone());
    }

    let outcome = match request.send().await {
        Ok(mut response) => {
            let status = response.status().as_u16();
            let peer_ip = response
                .remote_addr()
                .map(|address| address.ip().to_string())
                .unwrap_or_default();
            let headers = HeaderBag::from_reqwest(response.headers());

            match read_body(&mut response, options.max_body_size).await {
                Ok(bytes) => Ok(RawResponse {
                    status,
                    headers,
                    downloaded: bytes.len(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    peer_ip,
                }),
                Err(e) => Err(ExchangeError { error: error_text(&e), status }),
            }
        }
        Err(e) => Err(ExchangeError { error: error_text(&e), status: 0 }),
    };

    Exchange { target, outcome }
}

/// Reads at most `limit` decompressed body bytes; the rest of the stream is
/// abandoned with the response.
async fn read_body(response: &mut Response, limit: usize) -> reqwest::Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() >= limit {
            body.truncate(limit);
            break;
        }
    }
    Ok(body)
}

/// The innermost cause reads best in a fail log ("connection refused",
/// "operation timed out") compared to reqwest's nested wrapper text.
fn error_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text = cause.to_string();
        source = cause.source();
    }
    text
}
