//! Test fixtures for the oxidir workspace.
//!
//! This crate is not "just tests": it holds the reusable datasets and
//! service factories the integration suite (and other crates' tests)
//! build on: the example store, the referral fixture tree, and a
//! tracing bootstrap for test logs.

pub mod fixtures;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
/// Controlled by `RUST_LOG`; silent by default.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
