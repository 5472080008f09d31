use crate::errors::SinkError;
use crate::scenario::Category;
use crate::sinks::eval::Interpreter;
use crate::sinks::{Evidence, Exposure, Outcome, SinkAdapter, SinkInvocation};
use serde_json::Value;
use std::collections::HashMap;

// --------------------------------------------------------------------------
// Micro template renderer
// --------------------------------------------------------------------------

#[derive(Debug)]
struct RenderError(String);

/// Render `{{ ... }}` placeholders: an identifier resolves against `vars`,
/// anything else is evaluated as an expression with the full grammar. When
/// `autoescape` is on, substituted *values* are HTML-escaped; the fixed
/// template text never is.
fn render(
    template: &str,
    vars: &HashMap<String, String>,
    autoescape: bool,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or_else(|| RenderError("unclosed '{{' in template".into()))?;
        let expr = after[..close].trim();

        let value = if is_identifier(expr) {
            vars.get(expr)
                .cloned()
                .ok_or_else(|| RenderError(format!("unknown variable: {expr}")))?
        } else {
            let evaluated = Interpreter::new(expr)
                .eval()
                .map_err(|e| RenderError(format!("bad template expression: {}", e.0)))?;
            match evaluated {
                Value::String(s) => s,
                other => other.to_string(),
            }
        };

        if autoescape {
            out.push_str(&escape_html(&value));
        } else {
            out.push_str(&value);
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
        && !text.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn contains_markup(input: &str) -> bool {
    input.contains(['<', '>', '"'])
}

// --------------------------------------------------------------------------
// XSS sink
// --------------------------------------------------------------------------

const GREETING_TEMPLATE: &str = "<p>Hello {{name}}</p>";

/// Markup-embedding sink. Both paths bind the input as the `name` variable
/// of a fixed template; only the escaping mode differs.
pub struct XssSink;

impl XssSink {
    pub fn new() -> Self {
        Self
    }

    fn render_invocation(&self, exposure: Exposure, input: &str) -> SinkInvocation {
        let autoescape = exposure == Exposure::Safe;
        let vars = HashMap::from([("name".to_owned(), input.to_owned())]);

        let (outcome, evidence) = match render(GREETING_TEMPLATE, &vars, autoescape) {
            Ok(output) => {
                let raw_markup_emitted = contains_markup(input) && output.contains(input);
                (
                    Outcome::Value(output),
                    Evidence::MarkupEscaping { raw_markup_emitted },
                )
            }
            Err(err) => (
                Outcome::Rejected(err.0),
                Evidence::MarkupEscaping {
                    raw_markup_emitted: false,
                },
            ),
        };

        SinkInvocation {
            category: Category::Xss,
            exposure,
            raw_input: input.to_owned(),
            payload: GREETING_TEMPLATE.to_owned(),
            outcome,
            evidence,
        }
    }
}

impl SinkAdapter for XssSink {
    fn category(&self) -> Category {
        Category::Xss
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        Ok(self.render_invocation(Exposure::Unsafe, input))
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        Ok(self.render_invocation(Exposure::Safe, input))
    }
}

// --------------------------------------------------------------------------
// SSTI sink
// --------------------------------------------------------------------------

const FIXED_TEMPLATE: &str = "<p>Hello {{who}}!</p>";

/// Template-definition sink. The unsafe path splices the input into the
/// template *source* before rendering, so `{{ ... }}` inside the input is
/// compiled as template logic. The safe path renders a fixed template with
/// the input bound as plain data.
pub struct SstiSink;

impl SstiSink {
    pub fn new() -> Self {
        Self
    }
}

impl SinkAdapter for SstiSink {
    fn category(&self) -> Category {
        Category::Ssti
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let source = format!("<p>Hello {input}!</p>");
        tracing::debug!(target: "sinks", %source, "template compiled from tainted source");

        let (outcome, evidence) = match render(&source, &HashMap::new(), false) {
            Ok(output) => {
                let executed = input.contains("{{") && !output.contains(input);
                (Outcome::Value(output), Evidence::TemplateControl { executed })
            }
            Err(err) => (
                Outcome::Rejected(err.0),
                Evidence::TemplateControl { executed: false },
            ),
        };

        Ok(SinkInvocation {
            category: Category::Ssti,
            exposure: Exposure::Unsafe,
            raw_input: input.to_owned(),
            payload: source,
            outcome,
            evidence,
        })
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let vars = HashMap::from([("who".to_owned(), input.to_owned())]);

        let (outcome, evidence) = match render(FIXED_TEMPLATE, &vars, true) {
            Ok(output) => {
                // control syntax bound as data renders literally
                let executed = input.contains("{{") && !output.contains(input);
                (Outcome::Value(output), Evidence::TemplateControl { executed })
            }
            Err(err) => (
                Outcome::Rejected(err.0),
                Evidence::TemplateControl { executed: false },
            ),
        };

        Ok(SinkInvocation {
            category: Category::Ssti,
            exposure: Exposure::Safe,
            raw_input: input.to_owned(),
            payload: FIXED_TEMPLATE.to_owned(),
            outcome,
            evidence,
        })
    }
}

// --------------------------------------------------------------------------
// Tests
// --------------------------------------------------------------------------

#[test]
fn renderer_substitutes_variables_and_evaluates_expressions() {
    let vars = HashMap::from([("name".to_owned(), "alice".to_owned())]);
    assert_eq!(
        render("Hi {{name}}, {{ 6 * 7 }}!", &vars, false).unwrap(),
        "Hi alice, 42!"
    );
}

#[test]
fn renderer_escapes_values_not_template_text() {
    let vars = HashMap::from([("name".to_owned(), "<b>".to_owned())]);
    assert_eq!(
        render("<p>{{name}}</p>", &vars, true).unwrap(),
        "<p>&lt;b&gt;</p>"
    );
}

#[test]
fn unknown_variable_fails_the_render() {
    let err = render("{{missing}}", &HashMap::new(), false).unwrap_err();
    assert!(format!("{err:?}").contains("missing"));
}

#[test]
fn xss_sink_dispatches_through_the_adapter_trait() {
    let mut sink: Box<dyn SinkAdapter> = Box::new(XssSink::new());
    let inv = sink.invoke(Exposure::Unsafe, "friend").unwrap();
    assert_eq!(inv.category, Category::Xss);
    assert_eq!(inv.exposure, Exposure::Unsafe);
    assert_eq!(inv.outcome, Outcome::Value("<p>Hello friend</p>".into()));
}

#[test]
fn script_payload_survives_only_without_escaping() {
    let payload = r#"<script>alert("xss")</script>"#;
    let unsafe_inv = XssSink::new().invoke_unsafe(payload).unwrap();
    assert!(unsafe_inv.evidence.injection_observed());

    let safe_inv = XssSink::new().invoke_safe(payload).unwrap();
    assert!(!safe_inv.evidence.injection_observed());
    match safe_inv.outcome {
        Outcome::Value(ref out) => assert!(!out.contains("<script>")),
        ref other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn benign_name_renders_identically_on_both_paths() {
    let unsafe_inv = XssSink::new().invoke_unsafe("friend").unwrap();
    let safe_inv = XssSink::new().invoke_safe("friend").unwrap();
    assert_eq!(unsafe_inv.outcome, Outcome::Value("<p>Hello friend</p>".into()));
    assert_eq!(unsafe_inv.outcome, safe_inv.outcome);
}

#[test]
fn control_syntax_in_the_source_is_executed() {
    let inv = SstiSink::new().invoke_unsafe("{{7*7}}").unwrap();
    assert_eq!(inv.outcome, Outcome::Value("<p>Hello 49!</p>".into()));
    assert!(inv.evidence.injection_observed());
}

#[test]
fn control_syntax_bound_as_data_renders_literally() {
    let inv = SstiSink::new().invoke_safe("{{7*7}}").unwrap();
    assert_eq!(inv.outcome, Outcome::Value("<p>Hello {{7*7}}!</p>".into()));
    assert!(!inv.evidence.injection_observed());
}

#[test]
fn benign_text_is_equivalent_on_both_template_paths() {
    let unsafe_inv = SstiSink::new().invoke_unsafe("world").unwrap();
    let safe_inv = SstiSink::new().invoke_safe("world").unwrap();
    assert_eq!(unsafe_inv.outcome, Outcome::Value("<p>Hello world!</p>".into()));
    assert_eq!(unsafe_inv.outcome, safe_inv.outcome);
}
