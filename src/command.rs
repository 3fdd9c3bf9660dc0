//! Command assembly.
//!
//! Turns one invocation (a line plus optional cell text) into a
//! [`SqlCommand`]:
//!
//! 1. Parse the line into flags and leftover tokens. A line that does not
//!    parse becomes the body as-is.
//! 2. Pick the body: the line itself when there is no cell and no flag,
//!    otherwise the leftover tokens followed by the cell. A sole token that
//!    names a connection is routed to the connection instead of the body.
//! 3. Prepend `--file` contents.
//! 4. Parse the body, then expand `--with` snippets into CTEs.

use serde::Serialize;
use std::path::PathBuf;

use crate::args::{self, InvocationArgs, ParseAttempt};
use crate::classifier::{self, LineTarget};
use crate::config::Config;
use crate::connection::{ConnectionNamespace, ConnectionTarget};
use crate::error::{SqlCellError, SqlCellResult};
use crate::parser;
use crate::store::SnippetStore;

/// Where the SQL body of a command came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodySource {
    /// Leftover tokens of a line that also carried flags.
    Line,
    /// Cell text, possibly preceded by leftover line tokens.
    Cell,
    /// The whole line, reinterpreted as the body.
    LineAsBody,
    /// File contents prepended to the assembled body.
    File { path: PathBuf },
}

/// One fully resolved invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlCommand {
    args: InvocationArgs,
    connection: ConnectionTarget,
    body_source: BodySource,
    with_list: Vec<String>,
    sql_original: String,
    sql: String,
    result_var: Option<String>,
    return_result_var: bool,
}

impl SqlCommand {
    /// The SQL to execute, with any `--with` snippets expanded.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The SQL as written. Differs from [`Self::sql`] when `--with` was used.
    pub fn sql_original(&self) -> &str {
        &self.sql_original
    }

    pub fn connection(&self) -> &ConnectionTarget {
        &self.connection
    }

    pub fn result_var(&self) -> Option<&str> {
        self.result_var.as_deref()
    }

    pub fn return_result_var(&self) -> bool {
        self.return_result_var
    }

    pub fn with_list(&self) -> &[String] {
        &self.with_list
    }

    pub fn body_source(&self) -> &BodySource {
        &self.body_source
    }

    pub fn args(&self) -> &InvocationArgs {
        &self.args
    }
}

/// Build a command from an invocation line and cell text.
pub fn compose<N: ConnectionNamespace + ?Sized>(
    line: &str,
    cell: &str,
    store: &SnippetStore,
    namespace: &N,
    config: &Config,
) -> SqlCellResult<SqlCommand> {
    let has_cell = !cell.trim().is_empty();

    let (args, line_connection, body, mut body_source) = match args::parse_invocation(line) {
        ParseAttempt::Ambiguous => {
            tracing::debug!("treating the whole line as the body");
            if has_cell {
                tracing::warn!("line does not parse as invocation flags; ignoring the cell text");
            }
            (
                InvocationArgs::default(),
                None,
                line.to_string(),
                BodySource::LineAsBody,
            )
        }
        ParseAttempt::Parsed(args) => {
            let target = classifier::classify(&args.line, namespace);
            let line_connection = target.connection();

            if !has_cell && !args.any_flag_given() {
                match target {
                    LineTarget::Connection(_) | LineTarget::Alias(_) => (
                        InvocationArgs::default(),
                        line_connection,
                        String::new(),
                        BodySource::LineAsBody,
                    ),
                    // Re-parsing the now empty line yields no flags.
                    LineTarget::SqlBody(_) => (
                        InvocationArgs::default(),
                        None,
                        line.to_string(),
                        BodySource::LineAsBody,
                    ),
                }
            } else {
                let prefix = match target {
                    LineTarget::SqlBody(tokens) => tokens.join(" "),
                    LineTarget::Connection(_) | LineTarget::Alias(_) => String::new(),
                };
                let source = if has_cell {
                    BodySource::Cell
                } else {
                    BodySource::Line
                };
                let body = format!("{}\n{}", prefix, cell);
                (args, line_connection, body, source)
            }
        }
    };

    let body = match &args.file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SqlCellError::file_read(path, e))?;
            body_source = BodySource::File { path: path.clone() };
            format!("{}\n{}", contents, body)
        }
        None => body,
    };

    let parsed = parser::parse_body(&body, config)?;

    let connection = match (line_connection, parsed.connection, &args.section) {
        (Some(target), _, _) => target,
        (None, Some(dsn), _) => ConnectionTarget::Dsn(dsn),
        (None, None, Some(section)) => ConnectionTarget::Dsn(config.dsn_url(section)?.to_string()),
        (None, None, None) => ConnectionTarget::None,
    };

    let with_list = args.with.clone();
    let sql_original = parsed.sql;
    let sql = if with_list.is_empty() {
        sql_original.clone()
    } else {
        store.render(&sql_original, &with_list)?
    };

    tracing::debug!(
        connection = %connection,
        source = ?body_source,
        with = ?with_list,
        "composed command"
    );

    Ok(SqlCommand {
        args,
        connection,
        body_source,
        with_list,
        sql_original,
        sql,
        result_var: parsed.result_var,
        return_result_var: parsed.return_result_var,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRegistry;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    struct Fixture {
        store: SnippetStore,
        registry: ConnectionRegistry,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = ConnectionRegistry::new();
            registry.bind("myconn", "sqlite://my.db");
            registry.open("duckdb://", Some("duck"));
            Self {
                store: SnippetStore::new(),
                registry,
                config: Config::default(),
            }
        }

        fn compose(&self, line: &str, cell: &str) -> SqlCellResult<SqlCommand> {
            compose(line, cell, &self.store, &self.registry, &self.config)
        }
    }

    #[test]
    fn test_line_as_body() {
        let fx = Fixture::new();
        let cmd = fx.compose("SELECT 1", "").unwrap();
        assert_eq!(cmd.sql(), "SELECT 1");
        assert_eq!(cmd.sql_original(), "SELECT 1");
        assert_eq!(cmd.connection(), &ConnectionTarget::None);
        assert_eq!(cmd.body_source(), &BodySource::LineAsBody);
        assert_eq!(cmd.args(), &InvocationArgs::default());
    }

    #[test]
    fn test_sole_live_connection_token() {
        let fx = Fixture::new();
        let cmd = fx.compose("myconn", "").unwrap();
        assert_eq!(cmd.connection(), &ConnectionTarget::Live("myconn".into()));
        assert_eq!(cmd.sql(), "");
    }

    #[test]
    fn test_alias_with_cell_is_dropped_from_body() {
        let fx = Fixture::new();
        let cmd = fx.compose("duck", "SELECT 42").unwrap();
        assert_eq!(cmd.connection(), &ConnectionTarget::Alias("duck".into()));
        assert_eq!(cmd.sql(), "SELECT 42");
        assert_eq!(cmd.body_source(), &BodySource::Cell);
    }

    #[test]
    fn test_line_tokens_prefix_cell() {
        let fx = Fixture::new();
        let cmd = fx.compose("rows <<", "SELECT * FROM t").unwrap();
        assert_eq!(cmd.result_var(), Some("rows"));
        assert_eq!(cmd.sql(), "SELECT * FROM t");
    }

    #[test]
    fn test_dsn_on_line_with_cell() {
        let fx = Fixture::new();
        let cmd = fx.compose("sqlite://", "SELECT 1").unwrap();
        assert_eq!(cmd.connection(), &ConnectionTarget::Dsn("sqlite://".into()));
        assert_eq!(cmd.sql(), "SELECT 1");
    }

    #[test]
    fn test_unparseable_line_falls_back_to_body() {
        let fx = Fixture::new();
        let cmd = fx.compose("SELECT 'unterminated", "").unwrap();
        assert_eq!(cmd.sql(), "SELECT 'unterminated");
        assert_eq!(cmd.body_source(), &BodySource::LineAsBody);
        assert!(cmd.with_list().is_empty());
    }

    #[test]
    fn test_unparseable_line_replaces_cell() {
        let fx = Fixture::new();
        let cmd = fx.compose("--persist df", "SELECT 1").unwrap();
        assert_eq!(cmd.sql(), "--persist df");
        assert_eq!(cmd.body_source(), &BodySource::LineAsBody);
        assert_eq!(cmd.connection(), &ConnectionTarget::None);
        assert_eq!(cmd.args(), &InvocationArgs::default());
    }

    #[test]
    fn test_flags_without_cell_use_leftover_tokens() {
        let fx = Fixture::new();
        let cmd = fx.compose("--save one --no-execute SELECT 1", "").unwrap();
        assert_eq!(cmd.sql(), "SELECT 1");
        assert_eq!(cmd.args().save.as_deref(), Some("one"));
        assert_eq!(cmd.body_source(), &BodySource::Line);
    }

    #[test]
    fn test_with_expands_ctes() {
        let fx = Fixture::new();
        fx.store.register("a", "SELECT 1", &[]).unwrap();
        fx.store
            .register("b", "SELECT * FROM a", &["a".to_string()])
            .unwrap();

        let cmd = fx.compose("--with b", "SELECT * FROM b").unwrap();
        assert_eq!(
            cmd.sql(),
            "WITH a AS (SELECT 1), b AS (SELECT * FROM a) SELECT * FROM b"
        );
        assert_eq!(cmd.sql_original(), "SELECT * FROM b");
        assert_eq!(cmd.with_list(), ["b".to_string()]);
    }

    #[test]
    fn test_with_unknown_snippet() {
        let fx = Fixture::new();
        let err = fx.compose("--with ghost", "SELECT 1").unwrap_err();
        assert!(matches!(err, SqlCellError::UnknownSnippet { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn test_file_prepended() {
        let fx = Fixture::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "SELECT *").unwrap();

        let line = format!("--file {}", file.path().display());
        let cmd = fx.compose(&line, "FROM t").unwrap();
        assert_eq!(cmd.sql(), "SELECT *\n\nFROM t");
        assert_eq!(
            cmd.body_source(),
            &BodySource::File {
                path: file.path().to_path_buf()
            }
        );
    }

    #[test]
    fn test_missing_file() {
        let fx = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.sql");

        let line = format!("--file {}", missing.display());
        let err = fx.compose(&line, "").unwrap_err();
        match err {
            SqlCellError::FileRead { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected a file read error, got {other:?}"),
        }
    }

    #[test]
    fn test_section_flag() {
        let mut fx = Fixture::new();
        fx.config.dsn.insert(
            "wh".to_string(),
            crate::config::DsnSection {
                url: "postgresql://wh/prod".to_string(),
            },
        );
        let cmd = fx.compose("--section wh SELECT 1", "").unwrap();
        assert_eq!(
            cmd.connection(),
            &ConnectionTarget::Dsn("postgresql://wh/prod".into())
        );
        assert_eq!(cmd.sql(), "SELECT 1");
    }
}
