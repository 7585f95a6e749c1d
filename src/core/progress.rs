// src/core/progress.rs

use std::io::Write;

/// Rewrites a single progress line in place; a newline is emitted once the
/// last item has been processed. Shared by the resolver and the prober.
pub fn print_progress(processed: usize, total: usize, live: usize, failed: usize) {
    print!("\r[Progress] {}/{} | Live: {} | Failed: {}", processed, total, live, failed);
    if processed >= total {
        println!();
    }
    let _ = std::io::stdout().flush();
}
