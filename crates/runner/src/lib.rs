// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! strata-runner: the two built-in exec adapters (spec.md §4.3) plus the
//! trait family the engine schedules them through.

mod error;
mod glob_match;
mod shell;
mod traits;

pub use error::RunnerError;
pub use glob_match::GlobMatchRunner;
pub use shell::ShellExecRunner;
pub use traits::{ExecContext, ProvideRunner, Runner};

/// Picks the adapter an `Exec` block selects (spec.md §4.3's "two default
/// adapters"): the glob-match adapter when `glob` is set, the shell-exec
/// adapter otherwise.
pub fn build_runner(exec: &strata_core::Exec, default_shell: &str) -> Box<dyn Runner> {
    match &exec.glob {
        Some(pattern) => Box::new(GlobMatchRunner::new(pattern.clone())),
        None => Box::new(ShellExecRunner::new(exec.clone(), default_shell.to_string())),
    }
}
