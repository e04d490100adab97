//! The `check` command: validate the configuration and print diagnostics.

use std::path::Path;

use {
    anyhow::Result,
    rarsms_config::{Severity, ValidationResult},
};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Returns `false` when the configuration has errors.
pub fn check(explicit: Option<&Path>, verbose: bool) -> Result<bool> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => rarsms_config::find_config_file(),
    };

    let mut result = match &path {
        Some(p) => {
            eprintln!("Checking {}\n", p.display());
            rarsms_config::validate_file(p)
        },
        None => {
            eprintln!("No config file found; checking defaults and environment.\n");
            ValidationResult::default()
        },
    };

    // Wiring checks on the effective config, including flat env overrides.
    if !result.has_errors() {
        let loaded = rarsms_config::load(explicit)?;
        let resolved = rarsms_config::validate(&loaded.config);
        for d in resolved.diagnostics {
            let seen = result
                .diagnostics
                .iter()
                .any(|e| e.path == d.path && e.message == d.message);
            if !seen {
                result.diagnostics.push(d);
            }
        }
    }

    print_report(&result, verbose);
    Ok(!result.has_errors())
}

fn print_report(result: &ValidationResult, verbose: bool) {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message);
        } else {
            eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
        }
        shown += 1;
    }
    if shown > 0 {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}
