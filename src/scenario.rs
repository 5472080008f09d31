use crate::errors::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Vulnerability class a scenario demonstrates. One sink adapter exists per
/// category.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Deserialization,
    WeakHash,
    CommandInjection,
    EvalInjection,
    SqlInjection,
    Xss,
    Ssti,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Deserialization,
        Category::WeakHash,
        Category::CommandInjection,
        Category::EvalInjection,
        Category::SqlInjection,
        Category::Xss,
        Category::Ssti,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Deserialization => "deserialization",
            Category::WeakHash => "weak-hash",
            Category::CommandInjection => "command-injection",
            Category::EvalInjection => "eval-injection",
            Category::SqlInjection => "sql-injection",
            Category::Xss => "xss",
            Category::Ssti => "ssti",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = HarnessError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "deserialization" | "deser" => Ok(Category::Deserialization),
            "weak-hash" | "hash" => Ok(Category::WeakHash),
            "command-injection" | "command" => Ok(Category::CommandInjection),
            "eval-injection" | "eval" => Ok(Category::EvalInjection),
            "sql-injection" | "sql" | "sqli" => Ok(Category::SqlInjection),
            "xss" => Ok(Category::Xss),
            "ssti" => Ok(Category::Ssti),
            other => Err(HarnessError::UnknownCategory(other.to_owned())),
        }
    }
}

/// One registered demonstration: an unsafe and a safe operation over the
/// same sink, driven by the same two inputs. Immutable once registered.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub id: String,
    pub category: Category,
    pub description: String,
    pub benign_input: String,
    pub malicious_input: String,
}

impl Scenario {
    pub fn new(
        id: impl Into<String>,
        category: Category,
        description: impl Into<String>,
        benign_input: impl Into<String>,
        malicious_input: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            benign_input: benign_input.into(),
            malicious_input: malicious_input.into(),
        }
    }
}

/// Ordered scenario registry. Registration order is preserved; once sealed
/// the registry refuses further registrations.
#[derive(Debug, Default)]
pub struct Registry {
    scenarios: Vec<Scenario>,
    ids: HashSet<String>,
    sealed: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scenario: Scenario) -> HarnessResult<()> {
        if self.sealed {
            return Err(HarnessError::SealedRegistry);
        }
        if !self.ids.insert(scenario.id.clone()) {
            return Err(HarnessError::DuplicateScenario(scenario.id));
        }
        tracing::debug!(id = %scenario.id, category = %scenario.category, "scenario registered");
        self.scenarios.push(scenario);
        Ok(())
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Restartable iteration in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }
}

/// The stock scenario set, one per category, sealed.
pub fn builtin() -> HarnessResult<Registry> {
    let mut registry = Registry::new();

    registry.register(Scenario::new(
        "deser-reduce-hook",
        Category::Deserialization,
        "tagged object stream reconstructed with vs. without a type allowlist",
        r#"{"type": "User", "fields": {"name": "alice"}}"#,
        r#"{"type": "__reduce__", "argv": ["id"]}"#,
    ))?;

    registry.register(Scenario::new(
        "md5-password-digest",
        Category::WeakHash,
        "password digest with MD5 vs. SHA-256",
        "mySuperSecretPa$$w0rd",
        "collision-fodder-block-0123456789abcdef",
    ))?;

    registry.register(Scenario::new(
        "shell-echo-concat",
        Category::CommandInjection,
        "shell command assembled by concatenation vs. discrete argv element",
        "x",
        "x; id",
    ))?;

    registry.register(Scenario::new(
        "eval-config-string",
        Category::EvalInjection,
        "full expression evaluation vs. literal-only grammar over config text",
        r#"{"host": "localhost", "port": 8080}"#,
        r#"probe("id")"#,
    ))?;

    registry.register(Scenario::new(
        "sqlite-user-lookup",
        Category::SqlInjection,
        "user lookup by id, query text concatenation vs. bound parameter",
        "1",
        "1' OR '1'='1",
    ))?;

    registry.register(Scenario::new(
        "html-greeting",
        Category::Xss,
        "untrusted name interpolated into markup, raw vs. auto-escaped",
        "friend",
        r#"<script>alert("xss")</script>"#,
    ))?;

    registry.register(Scenario::new(
        "template-greeting",
        Category::Ssti,
        "untrusted text as template source vs. as bound data",
        "world",
        "{{7*7}}",
    ))?;

    registry.seal();
    Ok(registry)
}

#[test]
fn duplicate_id_is_rejected() {
    let mut registry = Registry::new();
    registry
        .register(Scenario::new("a", Category::Xss, "", "b", "m"))
        .unwrap();
    let err = registry
        .register(Scenario::new("a", Category::Ssti, "", "b", "m"))
        .unwrap_err();
    assert!(matches!(err, HarnessError::DuplicateScenario(id) if id == "a"));
}

#[test]
fn sealed_registry_rejects_registration() {
    let mut registry = Registry::new();
    registry.seal();
    let err = registry
        .register(Scenario::new("a", Category::Xss, "", "b", "m"))
        .unwrap_err();
    assert!(matches!(err, HarnessError::SealedRegistry));
}

#[test]
fn all_preserves_registration_order_and_restarts() {
    let mut registry = Registry::new();
    for id in ["first", "second", "third"] {
        registry
            .register(Scenario::new(id, Category::WeakHash, "", "b", "m"))
            .unwrap();
    }
    let order: Vec<&str> = registry.all().map(|s| s.id.as_str()).collect();
    assert_eq!(order, ["first", "second", "third"]);
    // second pass over the same registry sees the same sequence
    let again: Vec<&str> = registry.all().map(|s| s.id.as_str()).collect();
    assert_eq!(order, again);
}

#[test]
fn builtin_covers_every_category_once() {
    let registry = builtin().unwrap();
    let cats: HashSet<Category> = registry.all().map(|s| s.category).collect();
    assert_eq!(cats.len(), Category::ALL.len());
    assert_eq!(registry.len(), Category::ALL.len());
}

#[test]
fn category_round_trips_through_str() {
    for cat in Category::ALL {
        assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
    }
    assert!("not-a-category".parse::<Category>().is_err());
}
