// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! strata-cli: the `detect`/`build` lifecycle binaries (spec.md §6).

pub mod config;
pub mod exit_error;

pub use exit_error::ExitError;

/// Installs the `tracing` subscriber both binaries share, honoring
/// `RUST_LOG` the way `tracing-subscriber`'s `EnvFilter` does by default.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Runs `body`, translating an [`ExitError`] into the matching process
/// exit code instead of a panic. Shared by both lifecycle binaries'
/// `main()` so the translation logic lives in one place.
pub fn run<F>(body: F) -> !
where
    F: FnOnce() -> Result<(), ExitError>,
{
    init_tracing();
    match body() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            if e.code != 100 {
                tracing::error!("{}", e.message);
            }
            std::process::exit(e.code);
        }
    }
}
