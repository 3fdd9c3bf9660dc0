//! Leftover token classification.
//!
//! After flags are parsed, the remaining tokens are either SQL or, when a
//! single token names a known connection, a connection reference that must
//! not leak into the SQL body.

use crate::connection::{ConnectionNamespace, ConnectionTarget};

/// What the leftover tokens of an invocation line refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTarget<'a> {
    /// The sole token is a live connection name.
    Connection(&'a str),
    /// The sole token is a connection alias.
    Alias(&'a str),
    /// The tokens start the SQL body.
    SqlBody(&'a [String]),
}

impl LineTarget<'_> {
    /// The connection this line points at, if it is not SQL.
    pub fn connection(&self) -> Option<ConnectionTarget> {
        match self {
            Self::Connection(name) => Some(ConnectionTarget::Live(name.to_string())),
            Self::Alias(alias) => Some(ConnectionTarget::Alias(alias.to_string())),
            Self::SqlBody(_) => None,
        }
    }
}

/// Classify leftover tokens against the connection namespace.
///
/// Matching is exact and case-sensitive. A name that is both a live
/// connection and an alias counts as a live connection.
pub fn classify<'a, N: ConnectionNamespace + ?Sized>(
    tokens: &'a [String],
    namespace: &N,
) -> LineTarget<'a> {
    let target = match tokens {
        [only] if namespace.is_live_connection(only) => LineTarget::Connection(only),
        [only] if namespace.is_known_alias(only) => LineTarget::Alias(only),
        _ => LineTarget::SqlBody(tokens),
    };
    tracing::debug!(?target, "classified leftover tokens");
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Names {
        live: HashSet<&'static str>,
        aliases: HashSet<&'static str>,
    }

    impl ConnectionNamespace for Names {
        fn is_live_connection(&self, name: &str) -> bool {
            self.live.contains(name)
        }

        fn is_known_alias(&self, name: &str) -> bool {
            self.aliases.contains(name)
        }
    }

    fn names() -> Names {
        Names {
            live: ["myconn", "shared"].into_iter().collect(),
            aliases: ["duck", "shared"].into_iter().collect(),
        }
    }

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_live_connection() {
        let t = tokens("myconn");
        assert_eq!(classify(&t, &names()), LineTarget::Connection("myconn"));
    }

    #[test]
    fn test_alias() {
        let t = tokens("duck");
        assert_eq!(classify(&t, &names()), LineTarget::Alias("duck"));
        assert_eq!(
            classify(&t, &names()).connection(),
            Some(ConnectionTarget::Alias("duck".into()))
        );
    }

    #[test]
    fn test_case_sensitive() {
        let t = tokens("MyConn");
        assert_eq!(classify(&t, &names()), LineTarget::SqlBody(&t));
    }

    #[test]
    fn test_more_than_one_token_is_sql() {
        let t = tokens("myconn SELECT");
        assert_eq!(classify(&t, &names()), LineTarget::SqlBody(&t));
    }

    #[test]
    fn test_no_tokens_is_empty_sql() {
        let t: Vec<String> = Vec::new();
        assert_eq!(classify(&t, &names()), LineTarget::SqlBody(&[]));
    }

    #[test]
    fn test_live_wins_over_alias() {
        let t = tokens("shared");
        assert_eq!(classify(&t, &names()), LineTarget::Connection("shared"));
    }
}
