//! CLI command implementations

pub mod rules;
pub mod scan;

pub use rules::RulesArgs;
pub use scan::ScanArgs;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a project's dependencies and sources for vulnerabilities
    Scan(ScanArgs),

    /// List the active security rules
    Rules(RulesArgs),
}
