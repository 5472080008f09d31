use crate::errors::SinkError;
use crate::scenario::Category;
use crate::sinks::{Evidence, Exposure, Outcome, SinkAdapter, SinkInvocation};
use rusqlite::Connection;

/// Schema and seed rows for the ephemeral per-invocation store.
const SCHEMA: &str = r#"
    CREATE TABLE users (
        id    TEXT PRIMARY KEY,
        name  TEXT NOT NULL,
        email TEXT NOT NULL
    );
    INSERT INTO users (id, name, email) VALUES ('1', 'Alice Wonder', 'alice@example.com');
    INSERT INTO users (id, name, email) VALUES ('2', 'Bob The Builder', 'bob@example.com');
    INSERT INTO users (id, name, email) VALUES ('3', 'Charlie Chaplin', 'charlie@example.com');
"#;

/// SQL-execution sink over an in-memory SQLite database. The unsafe path
/// splices the input into the statement text; the safe path binds it as a
/// parameter. The detection signal compares the returned row count against a
/// literal-match baseline computed with the same input bound as a parameter,
/// so a quote that widens the WHERE clause shows up as a count mismatch.
pub struct SqlSink;

impl SqlSink {
    pub fn new() -> Self {
        Self
    }

    fn open_seeded() -> Result<Connection, SinkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn count_rows(conn: &Connection, query: &str) -> rusqlite::Result<usize> {
        let mut stmt = conn.prepare(query)?;
        let mut rows = stmt.query([])?;
        let mut n = 0;
        while rows.next()?.is_some() {
            n += 1;
        }
        Ok(n)
    }

    /// Rows a literal match for `input` would return. This is the baseline
    /// the detection signal compares against; it cannot be influenced by
    /// statement-text injection because the input never touches the text.
    fn literal_baseline(conn: &Connection, input: &str) -> Result<usize, SinkError> {
        let n: usize = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE id = ?1",
            rusqlite::params![input],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}

impl SinkAdapter for SqlSink {
    fn category(&self) -> Category {
        Category::SqlInjection
    }

    fn invoke_unsafe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let conn = Self::open_seeded()?;
        let query = format!("SELECT id, name, email FROM users WHERE id = '{input}'");
        tracing::debug!(target: "sinks", %query, "unsafe query text");

        let baseline = Self::literal_baseline(&conn, input)?;
        let (outcome, evidence) = match Self::count_rows(&conn, &query) {
            Ok(returned) => (
                Outcome::Value(format!("{returned} row(s)")),
                Evidence::QueryRows {
                    returned,
                    literal_baseline: baseline,
                },
            ),
            // input broke the statement syntax; the capability refused it
            Err(err) => (
                Outcome::Rejected(err.to_string()),
                Evidence::QueryRows {
                    returned: 0,
                    literal_baseline: baseline,
                },
            ),
        };

        Ok(SinkInvocation {
            category: Category::SqlInjection,
            exposure: Exposure::Unsafe,
            raw_input: input.to_owned(),
            payload: query,
            outcome,
            evidence,
        })
    }

    fn invoke_safe(&mut self, input: &str) -> Result<SinkInvocation, SinkError> {
        let conn = Self::open_seeded()?;
        let query = "SELECT id, name, email FROM users WHERE id = ?1";
        tracing::debug!(target: "sinks", %query, param = %input, "parameterized query");

        let mut stmt = conn.prepare(query)?;
        let mut rows = stmt.query(rusqlite::params![input])?;
        let mut returned = 0;
        while rows.next()?.is_some() {
            returned += 1;
        }
        drop(rows);
        drop(stmt);

        let baseline = Self::literal_baseline(&conn, input)?;

        Ok(SinkInvocation {
            category: Category::SqlInjection,
            exposure: Exposure::Safe,
            raw_input: input.to_owned(),
            payload: query.to_owned(),
            outcome: Outcome::Value(format!("{returned} row(s)")),
            evidence: Evidence::QueryRows {
                returned,
                literal_baseline: baseline,
            },
        })
    }
}

#[test]
fn benign_id_returns_one_row_on_both_paths() {
    let mut sink = SqlSink::new();
    let unsafe_inv = sink.invoke_unsafe("1").unwrap();
    let safe_inv = SqlSink::new().invoke_safe("1").unwrap();
    assert_eq!(unsafe_inv.outcome, Outcome::Value("1 row(s)".into()));
    assert_eq!(unsafe_inv.outcome, safe_inv.outcome);
    assert!(!unsafe_inv.evidence.injection_observed());
    assert!(!safe_inv.evidence.injection_observed());
}

#[test]
fn quote_breakout_widens_the_unsafe_query() {
    let inv = SqlSink::new().invoke_unsafe("1' OR '1'='1").unwrap();
    assert_eq!(
        inv.evidence,
        Evidence::QueryRows {
            returned: 3,
            literal_baseline: 0
        }
    );
    assert!(inv.evidence.injection_observed());
}

#[test]
fn bound_parameter_treats_the_payload_as_data() {
    let inv = SqlSink::new().invoke_safe("1' OR '1'='1").unwrap();
    assert_eq!(
        inv.evidence,
        Evidence::QueryRows {
            returned: 0,
            literal_baseline: 0
        }
    );
    assert!(!inv.evidence.injection_observed());
}

#[test]
fn statement_breaking_input_is_a_controlled_rejection() {
    // unbalanced quote: the unsafe query no longer parses
    let inv = SqlSink::new().invoke_unsafe("1'").unwrap();
    assert!(matches!(inv.outcome, Outcome::Rejected(_)));
}
