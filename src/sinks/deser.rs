use crate::errors::SinkError;
use crate::scenario::Category;
use crate::sinks::{Evidence, Exposure, Outcome, SinkAdapter, SinkInvocation};
use crate::utils::config::Config;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

/// Type tags every adapter accepts even with an empty config allowlist.
static BASE_ALLOWLIST: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["User", "Session", "Config"].into_iter().collect());

/// Which type tags a reconstruction is allowed to instantiate.
#[derive(Debug, Clone)]
pub enum ReconstructionPolicy {
    /// Honor every tag, including the `__reduce__` hook that requests a
    /// side-effecting call during reconstruction. The hook's "execution" is
    /// an inert recorded marker action, never a real process.
    Unrestricted,
    /// Only allowlisted plain-data tags reconstruct; hooks are refused.
    TypeAllowlisted(HashSet<String>),
}

/// Deserialization sink over a tagged object stream, modeled after
/// pickle-style reconstruction: a document is `{"type": T, ...}` and the
/// `__reduce__` tag asks the decoder to run a command while rebuilding the
/// object graph.
pub struct DeserSink {
    allowlist: HashSet<String>,
    side_effects: u32,
}

impl DeserSink {
    pub fn new(config: &Config) -> Self {
        let mut allowlist: HashSet<String> =
            BASE_ALLOWLIST.iter().map(|s| (*s).to_owned()).collect();
        allowlist.extend(config.sinks.deser_allowlist.iter().cloned());
        Self {
            allowlist,
            side_effects: 0,
        }
    }

    fn reconstruct(
        &mut self,
        input: &str,
        policy: &ReconstructionPolicy,
    ) -> (Outcome, Evidence) {
        self.side_effects = 0;

        let doc: Value = match serde_json::from_str(input) {
            Ok(doc) => doc,
            Err(err) => {
                return (
                    Outcome::Rejected(format!("malformed stream: {err}")),
                    Evidence::ReconstructionHooks { side_effects: 0 },
                );
            }
        };

        let tag = doc.get("type").and_then(Value::as_str).unwrap_or("");

        let outcome = match policy {
            ReconstructionPolicy::Unrestricted if tag == "__reduce__" => {
                // hook honored: record the marker action in place of the
                // call the stream asked for
                let argv: Vec<String> = doc
                    .get("argv")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_owned)
                            .collect()
                    })
                    .unwrap_or_default();
                self.side_effects += 1;
                tracing::debug!(target: "sinks", ?argv, "reconstruction hook fired");
                Outcome::Value(format!("hook invoked: {}", argv.join(" ")))
            }
            ReconstructionPolicy::Unrestricted => Self::rebuild(tag, &doc),
            ReconstructionPolicy::TypeAllowlisted(allowed) => {
                if allowed.contains(tag) {
                    Self::rebuild(tag, &doc)
                } else {
                    Outcome::Rejected(format!("type not allowlisted: {tag}"))
                }
            }
        };

        (
            outcome,
            Evidence::ReconstructionHooks {
                side_effects: self.side_effects,
            },
        )
    }

    /// Plain-data reconstruction shared by both policies.
    fn rebuild(tag: &str, doc: &Value) -> Outcome {
        if tag.is_empty() {
            return Outcome::Rejected("stream carries no type tag".into());
        }
        let fields = doc
            .get("fields")
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));
        Outcome::Value(format!("{tag} {fields}"))
    }
}

impl SinkAdapter for DeserSink {
    fn category(&self) -> Category {
        Category::Deserialization
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let (outcome, evidence) = self.reconstruct(input, &ReconstructionPolicy::Unrestricted);
        Ok(SinkInvocation {
            category: Category::Deserialization,
            exposure: Exposure::Unsafe,
            raw_input: input.to_owned(),
            payload: input.to_owned(),
            outcome,
            evidence,
        })
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let policy = ReconstructionPolicy::TypeAllowlisted(self.allowlist.clone());
        let (outcome, evidence) = self.reconstruct(input, &policy);
        Ok(SinkInvocation {
            category: Category::Deserialization,
            exposure: Exposure::Safe,
            raw_input: input.to_owned(),
            payload: input.to_owned(),
            outcome,
            evidence,
        })
    }
}

#[cfg(test)]
fn test_sink() -> DeserSink {
    DeserSink::new(&Config::default())
}

#[test]
fn reduce_hook_fires_under_the_unrestricted_policy() {
    let inv = test_sink()
        .invoke_unsafe(r#"{"type": "__reduce__", "argv": ["id"]}"#)
        .unwrap();
    assert_eq!(inv.outcome, Outcome::Value("hook invoked: id".into()));
    assert_eq!(inv.evidence, Evidence::ReconstructionHooks { side_effects: 1 });
    assert!(inv.evidence.injection_observed());
}

#[test]
fn allowlist_refuses_the_hook() {
    let inv = test_sink()
        .invoke_safe(r#"{"type": "__reduce__", "argv": ["id"]}"#)
        .unwrap();
    assert!(matches!(inv.outcome, Outcome::Rejected(_)));
    assert!(!inv.evidence.injection_observed());
}

#[test]
fn benign_document_reconstructs_identically_on_both_paths() {
    let input = r#"{"type": "User", "fields": {"name": "alice"}}"#;
    let unsafe_inv = test_sink().invoke_unsafe(input).unwrap();
    let safe_inv = test_sink().invoke_safe(input).unwrap();
    assert_eq!(unsafe_inv.outcome, Outcome::Value(r#"User {"name":"alice"}"#.into()));
    assert_eq!(unsafe_inv.outcome, safe_inv.outcome);
    assert!(!unsafe_inv.evidence.injection_observed());
}

#[test]
fn config_extends_the_allowlist() {
    let mut config = Config::default();
    config.sinks.deser_allowlist.push("Invoice".into());
    let inv = DeserSink::new(&config)
        .invoke_safe(r#"{"type": "Invoice", "fields": {"total": 3}}"#)
        .unwrap();
    assert_eq!(inv.outcome, Outcome::Value(r#"Invoice {"total":3}"#.into()));
}

#[test]
fn malformed_stream_is_a_controlled_rejection() {
    let inv = test_sink().invoke_unsafe("not json at all").unwrap();
    assert!(matches!(inv.outcome, Outcome::Rejected(_)));
    assert!(!inv.evidence.injection_observed());
}
