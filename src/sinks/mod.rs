pub mod command;
pub mod deser;
pub mod eval;
pub mod hash;
pub mod sql;
pub mod template;

use crate::errors::SinkError;
use crate::scenario::Category;
use crate::utils::config::Config;
use serde::Serialize;

/// How the sink was approached: through the vulnerable construction or the
/// sanitized one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    Unsafe,
    Safe,
}

/// What the sink produced. `Rejected` is the capability's own controlled
/// refusal of the payload (bad grammar, unknown type tag, broken SQL) and is
/// an expected outcome, distinct from a `SinkError`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "detail")]
pub enum Outcome {
    Value(String),
    Rejected(String),
}

/// Category-specific detection signal captured alongside the outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "signal")]
pub enum Evidence {
    /// Command sink: how many commands ran, and whether the output was the
    /// literal echo of the input.
    ShellExecutions { observed: u32, literal_echo: bool },
    /// SQL sink: rows returned vs. the parameterized literal-match baseline.
    QueryRows {
        returned: usize,
        literal_baseline: usize,
    },
    /// Hash sink: which algorithm produced the digest.
    DigestAlgorithm { name: &'static str, weak: bool },
    /// Eval sink: whether non-literal syntax (operators, calls) was accepted.
    EvalGrammar { non_literal_accepted: bool },
    /// Deserialization sink: side-effecting reconstruction hooks observed.
    ReconstructionHooks { side_effects: u32 },
    /// XSS sink: markup-significant input characters survived unescaped.
    MarkupEscaping { raw_markup_emitted: bool },
    /// SSTI sink: template control syntax from the input was executed.
    TemplateControl { executed: bool },
}

impl Evidence {
    /// Apply the category's detection signal: did the input alter the sink's
    /// behavior beyond literal-data substitution?
    pub fn injection_observed(&self) -> bool {
        match *self {
            Evidence::ShellExecutions {
                observed,
                literal_echo,
            } => observed > 1 || !literal_echo,
            Evidence::QueryRows {
                returned,
                literal_baseline,
            } => returned != literal_baseline,
            Evidence::DigestAlgorithm { weak, .. } => weak,
            Evidence::EvalGrammar {
                non_literal_accepted,
            } => non_literal_accepted,
            Evidence::ReconstructionHooks { side_effects } => side_effects > 0,
            Evidence::MarkupEscaping { raw_markup_emitted } => raw_markup_emitted,
            Evidence::TemplateControl { executed } => executed,
        }
    }
}

/// Record of one call into a sink.
#[derive(Debug, Clone, Serialize)]
pub struct SinkInvocation {
    pub category: Category,
    pub exposure: Exposure,
    pub raw_input: String,
    /// The constructed payload: assembled command line, query text, template
    /// source, or byte stream.
    pub payload: String,
    pub outcome: Outcome,
    pub evidence: Evidence,
}

/// One modeled external capability with a vulnerable and a sanitized entry
/// point. Adapters own their resources; a fresh adapter is constructed per
/// invocation so nothing leaks across scenarios or repeat runs.
pub trait SinkAdapter {
    fn category(&self) -> Category;

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError>;

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError>;

    fn invoke(&mut self, exposure: Exposure, input: &str) -> Result<SinkInvocation, SinkError> {
        match exposure {
            Exposure::Unsafe => self.invoke_unsafe(input),
            Exposure::Safe => self.invoke_safe(input),
        }
    }
}

/// Construct a fresh adapter for the category. Never reuse the returned
/// adapter across invocations.
pub fn adapter_for(category: Category, config: &Config) -> Box<dyn SinkAdapter> {
    match category {
        Category::Deserialization => Box::new(deser::DeserSink::new(config)),
        Category::WeakHash => Box::new(hash::HashSink::new()),
        Category::CommandInjection => Box::new(command::CommandSink::new(config)),
        Category::EvalInjection => Box::new(eval::EvalSink::new()),
        Category::SqlInjection => Box::new(sql::SqlSink::new()),
        Category::Xss => Box::new(template::XssSink::new()),
        Category::Ssti => Box::new(template::SstiSink::new()),
    }
}
