//! Invocation line parsing.
//!
//! An invocation line is split into shell-like tokens and then matched
//! against the invocation flags. Quoted sections stay attached to their
//! token and keep their quotes, because leftover tokens are joined back
//! into SQL text.
//!
//! ```text
//! --save big --with recent SELECT * FROM recent WHERE note = 'a b'
//! ─────┬──── ──────┬────── ───────────────────┬───────────────────
//!      │           │                          └── leftover tokens
//!      │           └── dependency list
//!      └── snippet to store
//! ```
//!
//! Parsing is allowed to fail. A line that does not tokenize or does not
//! match the flags is very likely plain SQL, so failure is reported as
//! [`ParseAttempt::Ambiguous`] for the caller to fall back on, never as an
//! error.

use clap::Parser;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::recognize,
    multi::{many0, many1},
    sequence::{delimited, preceded},
    IResult,
};
use serde::Serialize;
use std::path::PathBuf;

/// Flags accepted on an invocation line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Parser)]
#[command(
    name = "sql",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct InvocationArgs {
    /// Tokens not consumed by any flag
    #[arg(num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub line: Vec<String>,

    /// List open connections
    #[arg(short = 'l', long)]
    pub connections: bool,

    /// Close a connection by name or alias
    #[arg(short = 'x', long)]
    pub close: Option<String>,

    /// Connect using a DSN section from the config
    #[arg(short = 's', long)]
    pub section: Option<String>,

    /// Read SQL from a file and prepend it to the body
    #[arg(short = 'f', long, value_parser = parse_path)]
    pub file: Option<PathBuf>,

    /// Store the query under this name
    #[arg(short = 'S', long)]
    pub save: Option<String>,

    /// Compose saved snippets as CTEs (repeatable)
    #[arg(long = "with")]
    pub with: Vec<String>,

    /// Do not execute (use with --save)
    #[arg(short = 'N', long)]
    pub no_execute: bool,

    /// Alias for a newly opened connection
    #[arg(short = 'A', long)]
    pub alias: Option<String>,
}

impl InvocationArgs {
    /// Whether any flag (anything besides leftover tokens) was given.
    pub fn any_flag_given(&self) -> bool {
        self.connections
            || self.close.is_some()
            || self.section.is_some()
            || self.file.is_some()
            || self.save.is_some()
            || !self.with.is_empty()
            || self.no_execute
            || self.alias.is_some()
    }
}

/// Outcome of the structured parse of an invocation line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseAttempt {
    Parsed(InvocationArgs),
    /// The line is not a well-formed flag set.
    Ambiguous,
}

/// Try to parse an invocation line into flags plus leftover tokens.
pub fn parse_invocation(line: &str) -> ParseAttempt {
    let tokens = match tokenize(line) {
        Some(tokens) => tokens,
        None => {
            tracing::debug!(line, "invocation line does not tokenize");
            return ParseAttempt::Ambiguous;
        }
    };

    match InvocationArgs::try_parse_from(tokens) {
        Ok(args) => ParseAttempt::Parsed(args),
        Err(e) => {
            tracing::debug!(line, reason = ?e.kind(), "invocation flags do not parse");
            ParseAttempt::Ambiguous
        }
    }
}

/// Split a line into tokens. Returns `None` on an unterminated quote.
pub fn tokenize(line: &str) -> Option<Vec<String>> {
    match parse_tokens(line) {
        Ok(("", tokens)) => Some(tokens.into_iter().map(str::to_string).collect()),
        _ => None,
    }
}

fn parse_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, tokens) = many0(preceded(multispace0, parse_token))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, tokens))
}

/// A token is any run of bare text and quoted sections.
fn parse_token(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((
        parse_bare,
        parse_single_quoted,
        parse_double_quoted,
    ))))(input)
}

fn parse_bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '\'' && c != '"')(input)
}

fn parse_single_quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('\''), take_while(|c| c != '\''), char('\'')))(input)
}

fn parse_double_quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), take_while(|c| c != '"'), char('"')))(input)
}

/// Paths may be quoted to carry spaces.
fn parse_path(value: &str) -> Result<PathBuf, String> {
    let unquoted = ['\'', '"']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);

    if unquoted.is_empty() {
        return Err("empty path".to_string());
    }
    Ok(PathBuf::from(unquoted))
}
