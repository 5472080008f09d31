use crate::scenario::{Category, Scenario};
use crate::sinks::{self, Exposure, Outcome, SinkInvocation};
use crate::utils::config::Config;
use console::style;
use serde::Serialize;
use std::fmt;

/// Judgment over one sink invocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The input altered the sink's behavior beyond literal-data
    /// substitution.
    Injection,
    /// The input was treated as inert data (or refused outright).
    Contained,
    /// The adapter itself failed; no judgment possible.
    Error,
}

impl Verdict {
    fn from_invocation(invocation: &SinkInvocation) -> Self {
        match invocation.outcome {
            // a controlled refusal means the payload never reached the
            // capability as anything but data
            Outcome::Rejected(_) => Verdict::Contained,
            Outcome::Value(_) => {
                if invocation.evidence.injection_observed() {
                    Verdict::Injection
                } else {
                    Verdict::Contained
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Injection => "injection",
            Verdict::Contained => "contained",
            Verdict::Error => "error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Verdict::Injection => style("injection").red().to_string(),
            Verdict::Contained => style("contained").green().to_string(),
            Verdict::Error => style("error").yellow().bold().to_string(),
        };
        f.write_str(&s)
    }
}

/// Per-scenario aggregation of the four fixed invocations.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario_id: String,
    pub category: Category,
    pub unsafe_verdict_benign: Verdict,
    pub unsafe_verdict_malicious: Verdict,
    pub safe_verdict_benign: Verdict,
    pub safe_verdict_malicious: Verdict,
    /// Adapter errors encountered, in invocation order.
    pub errors: Vec<String>,
}

impl ScenarioReport {
    /// A scenario is correctly demonstrated iff the malicious input injects
    /// on the unsafe path and is contained on the safe path.
    pub fn demonstrated(&self) -> bool {
        self.unsafe_verdict_malicious == Verdict::Injection
            && self.safe_verdict_malicious == Verdict::Contained
    }
}

/// Execute one scenario: unsafe/benign, unsafe/malicious, safe/benign,
/// safe/malicious, in that order, each against a freshly constructed
/// adapter. Adapter failures become error verdicts; nothing propagates.
pub fn run_scenario(scenario: &Scenario, config: &Config) -> ScenarioReport {
    let calls = [
        (Exposure::Unsafe, scenario.benign_input.as_str()),
        (Exposure::Unsafe, scenario.malicious_input.as_str()),
        (Exposure::Safe, scenario.benign_input.as_str()),
        (Exposure::Safe, scenario.malicious_input.as_str()),
    ];

    let mut verdicts = [Verdict::Error; 4];
    let mut errors = Vec::new();

    for (slot, (exposure, input)) in calls.into_iter().enumerate() {
        // fresh adapter per invocation: no resource leaks across calls, and
        // repeat runs see identical starting state
        let mut adapter = sinks::adapter_for(scenario.category, config);
        match adapter.invoke(exposure, input) {
            Ok(invocation) => {
                verdicts[slot] = Verdict::from_invocation(&invocation);
                tracing::debug!(
                    id = %scenario.id,
                    category = %adapter.category(),
                    ?exposure,
                    verdict = verdicts[slot].as_str(),
                    payload = %invocation.payload,
                    "invocation complete"
                );
            }
            Err(err) => {
                tracing::warn!(id = %scenario.id, ?exposure, %err, "adapter failure");
                errors.push(err.to_string());
            }
        }
    }

    ScenarioReport {
        scenario_id: scenario.id.clone(),
        category: scenario.category,
        unsafe_verdict_benign: verdicts[0],
        unsafe_verdict_malicious: verdicts[1],
        safe_verdict_benign: verdicts[2],
        safe_verdict_malicious: verdicts[3],
        errors,
    }
}

/// Run every scenario in sequence. One scenario's failure never aborts the
/// rest.
pub fn run_all<'a>(
    scenarios: impl Iterator<Item = &'a Scenario>,
    config: &Config,
) -> Vec<ScenarioReport> {
    scenarios.map(|s| run_scenario(s, config)).collect()
}

#[cfg(test)]
use crate::scenario;

#[test]
fn sql_scenario_is_correctly_demonstrated() {
    let registry = scenario::builtin().unwrap();
    let sql = registry.find("sqlite-user-lookup").unwrap();
    let report = run_scenario(sql, &Config::default());

    assert_eq!(report.unsafe_verdict_benign, Verdict::Contained);
    assert_eq!(report.unsafe_verdict_malicious, Verdict::Injection);
    assert_eq!(report.safe_verdict_benign, Verdict::Contained);
    assert_eq!(report.safe_verdict_malicious, Verdict::Contained);
    assert!(report.demonstrated());
}

#[test]
fn in_process_builtin_scenarios_are_demonstrated() {
    // the command scenario spawns processes and is covered separately
    let registry = scenario::builtin().unwrap();
    let config = Config::default();
    for s in registry
        .all()
        .filter(|s| s.category != Category::CommandInjection)
    {
        let report = run_scenario(s, &config);
        assert!(
            report.demonstrated(),
            "{} not demonstrated: unsafe={}, safe={}",
            report.scenario_id,
            report.unsafe_verdict_malicious.as_str(),
            report.safe_verdict_malicious.as_str(),
        );
    }
}

#[test]
#[cfg(unix)]
fn command_scenario_is_correctly_demonstrated() {
    let registry = scenario::builtin().unwrap();
    let cmd = registry.find("shell-echo-concat").unwrap();
    let report = run_scenario(cmd, &Config::default());
    assert!(report.demonstrated());
}

#[test]
fn scenario_runs_are_idempotent() {
    let registry = scenario::builtin().unwrap();
    let sql = registry.find("sqlite-user-lookup").unwrap();
    let config = Config::default();

    let first = run_scenario(sql, &config);
    let second = run_scenario(sql, &config);
    assert_eq!(first.unsafe_verdict_benign, second.unsafe_verdict_benign);
    assert_eq!(
        first.unsafe_verdict_malicious,
        second.unsafe_verdict_malicious
    );
    assert_eq!(first.safe_verdict_benign, second.safe_verdict_benign);
    assert_eq!(first.safe_verdict_malicious, second.safe_verdict_malicious);
}

#[test]
fn adapter_failure_is_isolated_to_its_scenario() {
    let mut config = Config::default();
    config.sinks.shell_path = "/nonexistent/taintproof-shell".into();
    config.sinks.echo_path = "/nonexistent/taintproof-echo".into();

    let registry = scenario::builtin().unwrap();
    let reports = run_all(registry.all(), &config);

    assert_eq!(reports.len(), registry.len());
    let command_report = reports
        .iter()
        .find(|r| r.category == Category::CommandInjection)
        .unwrap();
    assert_eq!(command_report.unsafe_verdict_malicious, Verdict::Error);
    assert!(!command_report.errors.is_empty());

    // every other scenario still ran to a judgment
    for report in reports.iter().filter(|r| r.category != Category::CommandInjection) {
        assert!(report.demonstrated(), "{} should be unaffected", report.scenario_id);
    }
}
