use crate::errors::HarnessResult;
use crate::runner::ScenarioReport;
use console::style;
use serde::Serialize;

/// One report line per scenario:
/// `<scenario_id>: <PASS|FAIL> (unsafe=<verdict>, safe=<verdict>)`
/// where the two verdicts are the malicious-input ones.
pub fn console_line(report: &ScenarioReport) -> String {
    let judgment = if report.demonstrated() {
        style("PASS").green().bold()
    } else {
        style("FAIL").red().bold()
    };
    format!(
        "{}: {} (unsafe={}, safe={})",
        style(&report.scenario_id).blue(),
        judgment,
        report.unsafe_verdict_malicious,
        report.safe_verdict_malicious,
    )
}

pub fn print_console(reports: &[ScenarioReport], failed_only: bool, quiet: bool) {
    for report in reports {
        if failed_only && report.demonstrated() {
            continue;
        }
        println!("{}", console_line(report));
        if !quiet {
            for err in &report.errors {
                println!("    {} {}", style("error:").yellow().bold(), err);
            }
        }
    }

    if !quiet {
        let demonstrated = reports.iter().filter(|r| r.demonstrated()).count();
        println!(
            "\n{} {demonstrated}/{} scenario(s) correctly demonstrated",
            style("Summary:").bold(),
            reports.len()
        );
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    demonstrated: usize,
    total: usize,
    scenarios: &'a [ScenarioReport],
}

pub fn print_json(reports: &[ScenarioReport]) -> HarnessResult<()> {
    let doc = JsonReport {
        demonstrated: reports.iter().filter(|r| r.demonstrated()).count(),
        total: reports.len(),
        scenarios: reports,
    };
    let rendered = serde_json::to_string_pretty(&doc)
        .map_err(|e| crate::errors::HarnessError::Other(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
use crate::runner::Verdict;
#[cfg(test)]
use crate::scenario::Category;

#[cfg(test)]
fn sample_report(demonstrated: bool) -> ScenarioReport {
    ScenarioReport {
        scenario_id: "sqlite-user-lookup".into(),
        category: Category::SqlInjection,
        unsafe_verdict_benign: Verdict::Contained,
        unsafe_verdict_malicious: if demonstrated {
            Verdict::Injection
        } else {
            Verdict::Contained
        },
        safe_verdict_benign: Verdict::Contained,
        safe_verdict_malicious: Verdict::Contained,
        errors: vec![],
    }
}

#[test]
fn console_line_carries_the_malicious_verdicts() {
    let line = console::strip_ansi_codes(&console_line(&sample_report(true))).to_string();
    assert_eq!(
        line,
        "sqlite-user-lookup: PASS (unsafe=injection, safe=contained)"
    );

    let line = console::strip_ansi_codes(&console_line(&sample_report(false))).to_string();
    assert_eq!(
        line,
        "sqlite-user-lookup: FAIL (unsafe=contained, safe=contained)"
    );
}

#[test]
fn json_report_serializes_verdicts_lowercase() {
    let reports = vec![sample_report(true)];
    let doc = serde_json::to_value(JsonReport {
        demonstrated: 1,
        total: 1,
        scenarios: &reports,
    })
    .unwrap();
    assert_eq!(doc["scenarios"][0]["unsafe_verdict_malicious"], "injection");
    assert_eq!(doc["scenarios"][0]["category"], "sql-injection");
    assert_eq!(doc["demonstrated"], 1);
}
