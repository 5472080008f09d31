use crate::errors::{HarnessError, HarnessResult};
use crate::report;
use crate::runner;
use crate::scenario::{self, Category};
use crate::utils::config::Config;

/// Entry point called by the CLI. Exits nonzero when any selected scenario
/// is not correctly demonstrated, after attempting every one of them.
pub fn handle(
    categories: &[String],
    format: &str,
    failed_only: bool,
    config: &Config,
) -> HarnessResult<()> {
    let registry = scenario::builtin()?;

    let selected: Vec<Category> = categories
        .iter()
        .map(|c| c.parse())
        .collect::<HarnessResult<_>>()?;

    let scenarios = registry
        .all()
        .filter(|s| selected.is_empty() || selected.contains(&s.category));

    let reports = runner::run_all(scenarios, config);
    if reports.is_empty() {
        return Err("no scenarios matched the requested categories".into());
    }

    match resolve_format(format, &config.output.default_format)? {
        "json" => report::print_json(&reports)?,
        _ => report::print_console(&reports, failed_only, config.output.quiet),
    }

    if reports.iter().any(|r| !r.demonstrated()) {
        // regression signal for the analysis tool being validated
        std::process::exit(1);
    }
    Ok(())
}

/// An empty flag falls back to the configured default; anything that is not
/// a known format is an error rather than silent console output.
fn resolve_format<'a>(flag: &'a str, default: &'a str) -> HarnessResult<&'a str> {
    let chosen = if flag.is_empty() { default } else { flag };
    match chosen {
        "console" | "json" => Ok(chosen),
        other => Err(HarnessError::Other(format!("unknown output format: {other}"))),
    }
}

#[test]
fn unknown_format_is_rejected() {
    assert!(resolve_format("xml", "console").is_err());
    assert!(resolve_format("", "xml").is_err());
}

#[test]
fn empty_format_falls_back_to_the_configured_default() {
    assert_eq!(resolve_format("", "json").unwrap(), "json");
    assert_eq!(resolve_format("console", "json").unwrap(), "console");
}
