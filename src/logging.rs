//! Tracing subscriber setup.
//!
//! The `--log` option selects the sink: `0`/`off`, `1`/`stdout`,
//! `2`/`stderr` (default), or any other value as a file path opened in
//! append mode. `RUST_LOG`, when set, replaces the level chosen by
//! `--verbose`.

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// Parse the `--log` option.
    pub fn parse(value: &str) -> Self {
        match value {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" | "" => LogTarget::Stderr,
            path => LogTarget::File(PathBuf::from(path)),
        }
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn install<W>(writer: W, verbose: bool, ansi: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(writer)
        .with_ansi(ansi)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Install the global subscriber for `target`.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    match target {
        LogTarget::Off => Ok(()),
        LogTarget::Stdout => install(std::io::stdout, verbose, true),
        LogTarget::Stderr => install(std::io::stderr, verbose, true),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            install(file, verbose, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_target() {
        assert_eq!(LogTarget::parse("0"), LogTarget::Off);
        assert_eq!(LogTarget::parse("off"), LogTarget::Off);
        assert_eq!(LogTarget::parse("1"), LogTarget::Stdout);
        assert_eq!(LogTarget::parse("stderr"), LogTarget::Stderr);
        assert_eq!(LogTarget::parse("2"), LogTarget::Stderr);
        assert_eq!(
            LogTarget::parse("kanban.log"),
            LogTarget::File(PathBuf::from("kanban.log"))
        );
    }
}
