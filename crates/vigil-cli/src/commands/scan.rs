//! Scan command - checks dependencies and sources of a project

use crate::output::json::JsonFormatter;
use crate::output::text::TextFormatter;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing::debug;
use vigil_core::cache::FileCache;
use vigil_core::config::{Config, load_config_or_default_with_warnings};
use vigil_core::database::{DatabaseLoader, DatabaseSource, ReqwestFetcher};
use vigil_core::{ScanOptions, Scanner, Severity, sort_findings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Project directory or single file to scan
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Output format for findings
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Drop findings below this severity (low, medium, high, critical)
    #[arg(long, value_name = "LEVEL")]
    pub min_severity: Option<Severity>,

    /// Number of analysis workers
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Analyze files on the calling thread
    #[arg(long)]
    pub sequential: bool,

    /// Vulnerability database file or http(s) URL
    #[arg(long, value_name = "PATH|URL")]
    pub database: Option<String>,

    /// Base rule file, replacing the built-in rules
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Additional rules appended to the base set
    #[arg(long, value_name = "FILE")]
    pub custom_rules: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl ScanArgs {
    pub fn run(&self) -> Result<()> {
        self.configure_colors();

        let config_result = load_config_or_default_with_warnings(&self.path)?;
        for warning in &config_result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
        let config = config_result.config;

        let source = self.database_source(&config)?;
        let cache = FileCache::new(
            config.cache.dir.clone().unwrap_or_else(FileCache::default_dir),
            config.cache.ttl(),
        );
        let fetcher = ReqwestFetcher::new(config.database.timeout())?;
        let loader = DatabaseLoader::new(&cache, &fetcher);

        let scanner = Scanner::new(self.scan_options(&config));
        let mut report = scanner
            .scan_project(&self.path, &loader, &source, |progress| {
                debug!(
                    completed = progress.completed,
                    total = progress.total,
                    path = %progress.path.display(),
                    "file analyzed"
                );
            })
            .with_context(|| format!("Failed to scan {}", self.path.display()))?;
        sort_findings(&mut report.findings);

        let analyzed_path = self.path.to_string_lossy();
        match self.format {
            OutputFormat::Json => println!("{}", JsonFormatter::new().format(&report, &analyzed_path)),
            OutputFormat::Text => TextFormatter::new().write(&report, &mut io::stdout().lock())?,
        }

        if !report.findings.is_empty() {
            process::exit(1);
        }

        Ok(())
    }

    /// Command-line flags override the config file.
    fn scan_options(&self, config: &Config) -> ScanOptions {
        let mut options = ScanOptions::from_config(config);
        if let Some(min_severity) = self.min_severity {
            options.min_severity = min_severity;
        }
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if self.sequential {
            options.parallel = false;
        }
        if let Some(rules) = &self.rules {
            options.rules = Some(rules.clone());
        }
        if let Some(custom) = &self.custom_rules {
            options.custom_rules = Some(custom.clone());
        }
        options
    }

    fn database_source(&self, config: &Config) -> Result<DatabaseSource> {
        self.database
            .as_deref()
            .map(DatabaseSource::parse)
            .or_else(|| config.database.source())
            .context(
                "No vulnerability database configured. Pass --database or set [database] in vigil.toml",
            )
    }

    fn configure_colors(&self) {
        let no_color_env = std::env::var("NO_COLOR").is_ok();
        if self.no_color || no_color_env {
            colored::control::set_override(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;
    use crate::commands::Commands;

    fn scan_args(args: &[&str]) -> ScanArgs {
        let argv = ["vigil", "scan"].into_iter().chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Scan(args) => args,
            _ => panic!("Expected Scan command"),
        }
    }

    fn config(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn flags_override_config() {
        let config = config("[scan]\nmin_severity = \"low\"\nworkers = 8\nparallel = true\n");
        let args = scan_args(&["--min-severity", "critical", "--workers", "2", "--sequential"]);

        let options = args.scan_options(&config);

        assert_eq!(options.min_severity, Severity::Critical);
        assert_eq!(options.workers, 2);
        assert!(!options.parallel);
    }

    #[test]
    fn config_applies_without_flags() {
        let config = config("exclude = [\"dist\"]\n[scan]\nmin_severity = \"medium\"\nworkers = 3\n");
        let args = scan_args(&[]);

        let options = args.scan_options(&config);

        assert_eq!(options.min_severity, Severity::Medium);
        assert_eq!(options.workers, 3);
        assert!(options.parallel);
        assert_eq!(options.exclude, vec!["dist"]);
    }

    #[test]
    fn database_flag_wins_over_config() {
        let config = config("[database]\npath = \"/data/db.json\"\n");
        let args = scan_args(&["--database", "https://example.com/db.json"]);

        assert_eq!(
            args.database_source(&config).unwrap(),
            DatabaseSource::Url("https://example.com/db.json".to_string())
        );
    }

    #[test]
    fn database_from_config() {
        let config = config("[database]\npath = \"/data/db.json\"\n");
        let args = scan_args(&[]);

        assert_eq!(
            args.database_source(&config).unwrap(),
            DatabaseSource::File(PathBuf::from("/data/db.json"))
        );
    }

    #[test]
    fn missing_database_is_an_error() {
        let args = scan_args(&[]);

        let err = args.database_source(&Config::default()).unwrap_err();

        assert!(err.to_string().contains("--database"));
    }
}
