//! CLI entry point for bulkdl.

use std::process::ExitCode;

mod app;
mod app_config;
mod cli;
mod output;

/// Process outcome, mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every descriptor completed, or there was nothing to do.
    Success,
    /// Some descriptors completed and some failed.
    Partial,
    /// Nothing completed, the run was interrupted, or setup failed.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_bulkdl().await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "bulkdl failed");
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
