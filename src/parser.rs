//! Body parser using nom.
//!
//! Splits an assembled body into an optional connection, an optional
//! result capture and the SQL itself.
//!
//! # Syntax Overview
//!
//! ```text
//! postgresql://me@db/prod  rows << SELECT * FROM t
//! ───────────┬───────────  ──┬─── ───────┬───────
//!            │               │           └── SQL
//!            │               └── Result capture (`rows= <<` also returns it)
//!            └── Connection (contains `://` or `@`, or `[section]`)
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::{multispace0, multispace1},
    combinator::{eof, opt},
    sequence::{preceded, tuple},
    IResult,
};
use serde::Serialize;

use crate::config::Config;
use crate::error::SqlCellResult;

/// The structured form of a body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedBody {
    /// Connection string named at the start of the body.
    pub connection: Option<String>,
    pub sql: String,
    /// Variable to capture the result into.
    pub result_var: Option<String>,
    /// Set when the capture was written `var= <<`.
    pub return_result_var: bool,
}

/// Parse a body. `[section]` connections are looked up in `config`.
pub fn parse_body(text: &str, config: &Config) -> SqlCellResult<ParsedBody> {
    let mut parsed = ParsedBody::default();
    let mut rest = text.trim();

    if rest.is_empty() {
        return Ok(parsed);
    }

    if let Ok((remaining, first)) = parse_word(rest) {
        if let Some(connection) = connection_string(first, config)? {
            parsed.connection = Some(connection);
            rest = remaining.trim_start();
        }
    }

    if let Ok((remaining, (var, returns))) = parse_capture(rest) {
        parsed.result_var = Some(var.to_string());
        parsed.return_result_var = returns;
        rest = remaining.trim_start();
    }

    parsed.sql = rest.trim_end().to_string();
    Ok(parsed)
}

/// A leading word: anything up to whitespace.
fn parse_word(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_till1(char::is_whitespace))(input)
}

/// `var <<` or `var= <<`, spaces optional around `=` and before `<<`.
/// The `<<` must be followed by whitespace or the end of the body.
fn parse_capture(input: &str) -> IResult<&str, (&str, bool)> {
    let (input, var) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (input, returns) = preceded(multispace0, opt(tag("=")))(input)?;
    let (input, _) = tuple((multispace0, tag("<<"), alt((multispace1, eof))))(input)?;
    Ok((input, (var, returns.is_some())))
}

fn connection_string(word: &str, config: &Config) -> SqlCellResult<Option<String>> {
    if word.contains("://") || word.contains('@') {
        return Ok(Some(word.to_string()));
    }

    if let Some(section) = word.strip_prefix('[').and_then(|w| w.strip_suffix(']')) {
        if !section.is_empty() {
            return Ok(Some(config.dsn_url(section)?.to_string()));
        }
    }

    Ok(None)
}
