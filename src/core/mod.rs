// src/core/mod.rs

/// Shared data model: targets, probe outcomes, options and counters.
pub mod models;

/// Candidate host generation from root domains and wordlists.
pub mod candidates;

/// Sequential best-effort DNS pre-resolution.
pub mod resolver;

/// Resume-key loading and target filtering across output formats.
pub mod resume;

/// The bounded-concurrency HTTP probing engine.
pub mod prober;

/// Response dissection: headers, titles, pattern matches and liveness.
pub mod classify;

/// Streaming result writers and the failure log.
pub mod output;

/// In-place progress reporting shared by the resolver and the prober.
pub mod progress;

/// End-to-end orchestration of the two scan modes.
pub mod runner;
