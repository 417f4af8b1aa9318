//! Rules command - lists the rules a scan would apply

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use vigil_core::config::load_config_or_default_with_warnings;
use vigil_core::patterns::PatternSet;
use vigil_core::{ScanOptions, Scanner};

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Directory to look up vigil.toml from
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Base rule file, replacing the built-in rules
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Additional rules appended to the base set
    #[arg(long, value_name = "FILE")]
    pub custom_rules: Option<PathBuf>,
}

impl RulesArgs {
    pub fn run(&self) -> Result<()> {
        let config_result = load_config_or_default_with_warnings(&self.config_dir)?;
        for warning in &config_result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }

        let patterns = self.active_rules(ScanOptions::from_config(&config_result.config))?;
        if patterns.is_empty() {
            println!("No rules loaded.");
            return Ok(());
        }

        for pattern in &patterns {
            println!(
                "{:<28} {:<9} {:<21} {}",
                pattern.id.bold(),
                pattern.severity.as_str(),
                pattern.node_kind.as_str().dimmed(),
                pattern.description
            );
        }
        println!();
        println!("{} rule(s)", patterns.len());

        Ok(())
    }

    /// Unlike a scan, an unreadable custom rule file is reported as an error here.
    fn active_rules(&self, mut options: ScanOptions) -> Result<PatternSet> {
        if let Some(rules) = &self.rules {
            options.rules = Some(rules.clone());
        }
        if let Some(custom) = &self.custom_rules {
            options.custom_rules = Some(custom.clone());
        }

        let mut patterns = Scanner::new(options.clone()).load_patterns();
        if let Some(custom) = &options.custom_rules {
            patterns.extend_from_file(custom)?;
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn args(rules: Option<PathBuf>, custom_rules: Option<PathBuf>) -> RulesArgs {
        RulesArgs {
            config_dir: PathBuf::from("."),
            rules,
            custom_rules,
        }
    }

    #[test]
    fn builtin_rules_by_default() {
        let patterns = args(None, None).active_rules(ScanOptions::default()).unwrap();

        assert!(patterns.iter().any(|p| p.id == "js-eval"));
    }

    #[test]
    fn custom_rules_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom.json");
        fs::write(
            &custom,
            r#"[
                { "id": "no-debug", "description": "debug flag", "severity": "low",
                  "nodeKind": "Identifier", "pattern": { "type": "Identifier", "name": "DEBUG" } },
                { "id": "", "description": "dropped", "severity": "low",
                  "nodeKind": "Identifier", "pattern": { "type": "Identifier" } }
            ]"#,
        )
        .unwrap();
        let builtin = PatternSet::builtin().unwrap().len();

        let patterns = args(None, Some(custom))
            .active_rules(ScanOptions::default())
            .unwrap();

        assert_eq!(patterns.len(), builtin + 1);
        assert_eq!(patterns.as_slice().last().unwrap().id, "no-debug");
    }

    #[test]
    fn missing_custom_rules_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let result =
            args(None, Some(dir.path().join("missing.json"))).active_rules(ScanOptions::default());

        assert!(result.is_err());
    }
}
