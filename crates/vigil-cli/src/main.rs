//! Vigil CLI - dependency and source vulnerability scanner
//!
//! Checks a project's `package.json` against a vulnerability database and
//! matches its JavaScript/TypeScript sources against security rules.

mod commands;
mod logging;
mod output;

use clap::{Parser, ValueEnum};
use commands::Commands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    author,
    version,
    about = "Vulnerability scanner for JavaScript/TypeScript projects",
    long_about = "Vigil checks npm dependencies against a vulnerability database and scans\n\
                  source files for insecure code patterns.\n\n\
                  Configure logging with --log-level or RUST_LOG."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, value_enum, default_value = "warn", global = true, help = "Set the log level")]
    pub log_level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli);

    match cli.command {
        Commands::Scan(args) => args.run(),
        Commands::Rules(args) => args.run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::PathBuf;
    use vigil_core::Severity;

    #[test]
    fn cli_parses_scan_command() {
        let cli = Cli::try_parse_from(["vigil", "scan", "./app"]).unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.path, PathBuf::from("./app"));
                assert_eq!(args.format, commands::scan::OutputFormat::Text);
                assert!(!args.sequential);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn scan_path_defaults_to_current_dir() {
        let cli = Cli::try_parse_from(["vigil", "scan"]).unwrap();
        match cli.command {
            Commands::Scan(args) => assert_eq!(args.path, PathBuf::from(".")),
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn cli_parses_scan_options() {
        let cli = Cli::try_parse_from([
            "vigil",
            "scan",
            ".",
            "--format",
            "json",
            "--min-severity",
            "high",
            "--workers",
            "3",
            "--sequential",
            "--database",
            "https://example.com/db.json",
            "--custom-rules",
            "custom.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.format, commands::scan::OutputFormat::Json);
                assert_eq!(args.min_severity, Some(Severity::High));
                assert_eq!(args.workers, Some(3));
                assert!(args.sequential);
                assert_eq!(args.database.as_deref(), Some("https://example.com/db.json"));
                assert_eq!(args.custom_rules, Some(PathBuf::from("custom.json")));
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_severity() {
        let result = Cli::try_parse_from(["vigil", "scan", "--min-severity", "severe"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_rules_command() {
        let cli = Cli::try_parse_from(["vigil", "rules", "--rules", "base.json"]).unwrap();
        match cli.command {
            Commands::Rules(args) => assert_eq!(args.rules, Some(PathBuf::from("base.json"))),
            _ => panic!("Expected Rules command"),
        }
    }

    #[test]
    fn log_options_are_global() {
        let cli =
            Cli::try_parse_from(["vigil", "scan", ".", "--log-level", "debug", "--log-json"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(cli.log_json);
    }

    #[test]
    fn default_log_level_is_warn() {
        let cli = Cli::try_parse_from(["vigil", "rules"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert!(!cli.log_json);
    }

    #[test]
    fn log_level_ordering_matches_tracing() {
        assert!(LogLevel::Warn.as_tracing_level() < LogLevel::Info.as_tracing_level());
        assert_eq!(LogLevel::Trace.as_tracing_level(), tracing::Level::TRACE);
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["vigil"]).is_err());
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
