use crate::errors::SinkError;
use crate::scenario::Category;
use crate::sinks::{Evidence, Exposure, Outcome, SinkAdapter, SinkInvocation};
use serde_json::Value;

/// Expression-evaluation sink. The unsafe path runs a full expression
/// grammar: literals and containers plus arithmetic operators and builtin
/// function calls, so attacker text can reach executable constructs. The
/// safe path accepts only the literal grammar (`serde_json`): numbers,
/// strings, bools, null, nested containers, nothing else.
pub struct EvalSink;

impl EvalSink {
    pub fn new() -> Self {
        Self
    }
}

impl SinkAdapter for EvalSink {
    fn category(&self) -> Category {
        Category::EvalInjection
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let mut interp = Interpreter::new(input);
        let (outcome, non_literal) = match interp.eval() {
            Ok(value) => (
                Outcome::Value(value.to_string()),
                interp.non_literal_used,
            ),
            Err(err) => (Outcome::Rejected(err.0), false),
        };

        Ok(SinkInvocation {
            category: Category::EvalInjection,
            exposure: Exposure::Unsafe,
            raw_input: input.to_owned(),
            payload: format!("eval({input})"),
            outcome,
            evidence: Evidence::EvalGrammar {
                non_literal_accepted: non_literal,
            },
        })
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let outcome = match serde_json::from_str::<Value>(input) {
            Ok(value) => Outcome::Value(value.to_string()),
            Err(err) => Outcome::Rejected(format!("not a literal: {err}")),
        };

        Ok(SinkInvocation {
            category: Category::EvalInjection,
            exposure: Exposure::Safe,
            raw_input: input.to_owned(),
            payload: format!("literal_eval({input})"),
            outcome,
            // the literal grammar cannot accept non-literal syntax
            evidence: Evidence::EvalGrammar {
                non_literal_accepted: false,
            },
        })
    }
}

// --------------------------------------------------------------------------
// Full expression grammar
// --------------------------------------------------------------------------

pub(crate) struct EvalError(pub(crate) String);

impl EvalError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Recursive-descent evaluator over:
///
/// ```text
/// expr    := term (("+" | "-") term)*
/// term    := unary (("*" | "/") unary)*
/// unary   := "-" unary | primary
/// primary := number | string | true | false | null
///          | "[" (expr ("," expr)*)? "]"
///          | "{" (string ":" expr)* "}"
///          | ident "(" (expr ("," expr)*)? ")"
/// ```
///
/// Any operator application or function call marks `non_literal_used`; a
/// bare literal leaves it false, matching what the restricted grammar would
/// have accepted.
pub(crate) struct Interpreter {
    chars: Vec<char>,
    pos: usize,
    pub(crate) non_literal_used: bool,
}

impl Interpreter {
    pub(crate) fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            non_literal_used: false,
        }
    }

    pub(crate) fn eval(&mut self) -> Result<Value, EvalError> {
        let value = self.expr()?;
        self.skip_ws();
        if self.pos != self.chars.len() {
            return Err(EvalError::new(format!(
                "trailing input at offset {}",
                self.pos
            )));
        }
        Ok(value)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<(), EvalError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(EvalError::new(format!("expected '{want}', found '{c}'"))),
            None => Err(EvalError::new(format!("expected '{want}', found end of input"))),
        }
    }

    fn expr(&mut self) -> Result<Value, EvalError> {
        let mut lhs = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(op @ ('+' | '-')) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    self.non_literal_used = true;
                    lhs = arith(op, &lhs, &rhs)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Value, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(op @ ('*' | '/')) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    self.non_literal_used = true;
                    lhs = arith(op, &lhs, &rhs)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Value, EvalError> {
        self.skip_ws();
        if self.peek() == Some('-') {
            // negative literal, not an operator application
            return self.primary_number_or_negate();
        }
        self.primary()
    }

    fn primary_number_or_negate(&mut self) -> Result<Value, EvalError> {
        self.expect('-')?;
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let value = self.number()?;
                negate(&value)
            }
            _ => {
                let value = self.unary()?;
                self.non_literal_used = true;
                negate(&value)
            }
        }
    }

    fn primary(&mut self) -> Result<Value, EvalError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() => self.number(),
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some('[') => self.list(),
            Some('{') => self.dict(),
            Some(c) if c.is_alphabetic() || c == '_' => self.ident_or_call(),
            Some(c) => Err(EvalError::new(format!("unexpected character '{c}'"))),
            None => Err(EvalError::new("unexpected end of input")),
        }
    }

    fn number(&mut self) -> Result<Value, EvalError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.contains('.') {
            let f: f64 = text
                .parse()
                .map_err(|_| EvalError::new(format!("bad number: {text}")))?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| EvalError::new(format!("non-finite number: {text}")))
        } else {
            let n: i64 = text
                .parse()
                .map_err(|_| EvalError::new(format!("bad number: {text}")))?;
            Ok(Value::from(n))
        }
    }

    fn string(&mut self) -> Result<String, EvalError> {
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    Some(c) => return Err(EvalError::new(format!("bad escape '\\{c}'"))),
                    None => return Err(EvalError::new("unterminated string")),
                },
                Some(c) => out.push(c),
                None => return Err(EvalError::new("unterminated string")),
            }
        }
    }

    fn list(&mut self) -> Result<Value, EvalError> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.expr()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                _ => return Err(EvalError::new("expected ',' or ']' in list")),
            }
        }
    }

    fn dict(&mut self) -> Result<Value, EvalError> {
        self.expect('{')?;
        let mut map = serde_json::Map::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            self.skip_ws();
            if !matches!(self.peek(), Some('"') | Some('\'')) {
                return Err(EvalError::new("dict keys must be quoted strings"));
            }
            let key = self.string()?;
            self.expect(':')?;
            let value = self.expr()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(EvalError::new("expected ',' or '}' in dict")),
            }
        }
    }

    fn ident_or_call(&mut self) -> Result<Value, EvalError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let ident: String = self.chars[start..self.pos].iter().collect();

        match ident.as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" | "None" => return Ok(Value::Null),
            _ => {}
        }

        self.skip_ws();
        if self.peek() != Some('(') {
            return Err(EvalError::new(format!("unknown name: {ident}")));
        }
        self.pos += 1;

        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
        } else {
            loop {
                args.push(self.expr()?);
                self.skip_ws();
                match self.bump() {
                    Some(',') => continue,
                    Some(')') => break,
                    _ => return Err(EvalError::new("expected ',' or ')' in call")),
                }
            }
        }

        // reaching a call at all means the grammar left literal territory
        self.non_literal_used = true;
        call_builtin(&ident, &args)
    }
}

fn negate(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) if n.is_i64() => Ok(Value::from(-n.as_i64().unwrap_or(0))),
        Value::Number(n) => serde_json::Number::from_f64(-n.as_f64().unwrap_or(0.0))
            .map(Value::Number)
            .ok_or_else(|| EvalError::new("non-finite negation")),
        _ => Err(EvalError::new("cannot negate a non-number")),
    }
}

fn arith(op: char, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (a, b) = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => (a, b),
        _ => return Err(EvalError::new(format!("'{op}' needs numeric operands"))),
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if op != '/' {
            let r = match op {
                '+' => x.checked_add(y),
                '-' => x.checked_sub(y),
                '*' => x.checked_mul(y),
                _ => unreachable!(),
            };
            return r
                .map(Value::from)
                .ok_or_else(|| EvalError::new("integer overflow"));
        }
    }

    let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
    let r = match op {
        '+' => x + y,
        '-' => x - y,
        '*' => x * y,
        '/' => {
            if y == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            x / y
        }
        _ => unreachable!(),
    };
    serde_json::Number::from_f64(r)
        .map(Value::Number)
        .ok_or_else(|| EvalError::new("non-finite result"))
}

/// Builtins reachable from the full grammar. `probe` is the inert marker
/// standing in for an arbitrary side-effecting call.
fn call_builtin(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "probe" => {
            let arg = args
                .first()
                .map(|v| v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string()))
                .unwrap_or_default();
            tracing::debug!(target: "sinks", %arg, "probe builtin reached");
            Ok(Value::String(format!("probe:{arg}")))
        }
        "len" => match args.first() {
            Some(Value::Array(items)) => Ok(Value::from(items.len() as i64)),
            Some(Value::String(s)) => Ok(Value::from(s.chars().count() as i64)),
            Some(Value::Object(map)) => Ok(Value::from(map.len() as i64)),
            _ => Err(EvalError::new("len() needs a container or string")),
        },
        other => Err(EvalError::new(format!("unknown function: {other}"))),
    }
}

#[cfg(test)]
fn eval_unsafe(input: &str) -> SinkInvocation {
    EvalSink::new().invoke_unsafe(input).unwrap()
}

#[test]
fn pure_literal_stays_in_literal_territory() {
    let inv = eval_unsafe(r#"{"host": "localhost", "port": 8080}"#);
    assert_eq!(
        inv.outcome,
        Outcome::Value(r#"{"host":"localhost","port":8080}"#.into())
    );
    assert!(!inv.evidence.injection_observed());
}

#[test]
fn arithmetic_marks_non_literal_acceptance() {
    let inv = eval_unsafe("1 + 1");
    assert_eq!(inv.outcome, Outcome::Value("2".into()));
    assert!(inv.evidence.injection_observed());
}

#[test]
fn function_call_marks_non_literal_acceptance() {
    let inv = eval_unsafe(r#"probe("id")"#);
    assert_eq!(inv.outcome, Outcome::Value(r#""probe:id""#.into()));
    assert!(inv.evidence.injection_observed());
}

#[test]
fn nested_containers_and_negatives_evaluate() {
    let inv = eval_unsafe(r#"[1, -2, [true, null], {"k": "v"}]"#);
    assert_eq!(
        inv.outcome,
        Outcome::Value(r#"[1,-2,[true,null],{"k":"v"}]"#.into())
    );
    assert!(!inv.evidence.injection_observed());
}

#[test]
fn unknown_function_is_a_controlled_rejection() {
    let inv = eval_unsafe(r#"system("id")"#);
    assert!(matches!(inv.outcome, Outcome::Rejected(_)));
}

#[test]
fn literal_grammar_rejects_calls_and_accepts_literals() {
    let mut sink = EvalSink::new();
    let rejected = sink.invoke_safe(r#"probe("id")"#).unwrap();
    assert!(matches!(rejected.outcome, Outcome::Rejected(_)));
    assert!(!rejected.evidence.injection_observed());

    let accepted = sink.invoke_safe(r#"{"host": "localhost", "port": 8080}"#).unwrap();
    assert_eq!(
        accepted.outcome,
        Outcome::Value(r#"{"host":"localhost","port":8080}"#.into())
    );
}

#[test]
fn benign_config_is_equivalent_on_both_paths() {
    let input = r#"{"host": "localhost", "port": 8080}"#;
    let unsafe_inv = eval_unsafe(input);
    let safe_inv = EvalSink::new().invoke_safe(input).unwrap();
    assert_eq!(unsafe_inv.outcome, safe_inv.outcome);
}
