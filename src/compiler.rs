//! CTE compiler.
//!
//! Renders a resolved snippet closure in front of a final query:
//!
//! ```text
//! [a: SELECT 1, b: SELECT * FROM a] + "SELECT * FROM b"
//!   => WITH a AS (SELECT 1), b AS (SELECT * FROM a) SELECT * FROM b
//! ```

use crate::resolver::ResolvedSnippet;

/// Trait for converting composed queries to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

/// A final query together with the CTEs it needs.
#[derive(Debug, Clone, Copy)]
pub struct CteQuery<'a> {
    pub ctes: &'a [ResolvedSnippet],
    pub query: &'a str,
}

impl ToSql for ResolvedSnippet {
    fn to_sql(&self) -> String {
        // A trailing line comment must not swallow the closing paren.
        if self.body.contains("--") && !self.body.ends_with('\n') {
            format!("{} AS ({}\n)", self.name, self.body)
        } else {
            format!("{} AS ({})", self.name, self.body)
        }
    }
}

impl ToSql for CteQuery<'_> {
    fn to_sql(&self) -> String {
        // Nothing to prepend: hand the query back untouched.
        if self.ctes.is_empty() {
            return self.query.to_string();
        }

        let ctes: Vec<String> = self.ctes.iter().map(|c| c.to_sql()).collect();

        let mut sql = String::from("WITH ");
        sql.push_str(&ctes.join(", "));
        sql.push(' ');
        sql.push_str(self.query);
        sql
    }
}

/// Render `ctes` (already in dependency order) in front of `query`.
///
/// Bodies are inserted verbatim. The closure is expected to come from the
/// resolver, which never yields the same name twice.
pub fn compile(ctes: &[ResolvedSnippet], query: &str) -> String {
    CteQuery { ctes, query }.to_sql()
}
