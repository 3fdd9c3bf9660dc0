//! Session runtime.
//!
//! A [`Session`] owns the snippet store, the connection registry and the
//! configuration for as long as the user keeps working. Each call to
//! [`Session::run`] handles one invocation to completion: compose, apply
//! bookkeeping flags, then hand the final SQL to an [`Executor`].

use serde::Serialize;

use crate::command::{self, SqlCommand};
use crate::config::Config;
use crate::connection::{
    ConnectionHandle, ConnectionNamespace, ConnectionRegistry, ConnectionSummary,
};
use crate::error::SqlCellResult;
use crate::store::SnippetStore;

/// Runs composed SQL against a connection. Drivers live behind this trait.
pub trait Executor {
    type Output;

    fn execute(&mut self, connection: &ConnectionHandle, sql: &str) -> SqlCellResult<Self::Output>;
}

/// What an invocation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// `--connections`
    Connections { connections: Vec<ConnectionSummary> },
    /// `--close`
    Closed { connection: ConnectionHandle },
    /// `--no-execute`: composed (and possibly saved), not run.
    Skipped { command: SqlCommand },
    /// A connection was selected but there was no SQL to run.
    Connected { connection: ConnectionHandle },
    /// SQL was handed to the executor.
    Executed { command: SqlCommand, output: T },
}

/// Session state shared by all invocations.
#[derive(Debug)]
pub struct Session {
    store: SnippetStore,
    connections: ConnectionRegistry,
    config: Config,
}

impl Session {
    /// Start a session: bind configured connections and load configured
    /// snippets.
    pub fn new(config: Config) -> SqlCellResult<Self> {
        let mut session = Self {
            store: SnippetStore::new(),
            connections: ConnectionRegistry::new(),
            config,
        };
        session.load_config()?;
        Ok(session)
    }

    fn load_config(&mut self) -> SqlCellResult<()> {
        if let Some(name) = &self.config.default_connection {
            if let Some(url) = self.config.connections.get(name) {
                self.connections.bind(name, url);
            }
        }
        for (name, url) in &self.config.connections {
            if !self.connections.is_live_connection(name) {
                self.connections.bind(name, url);
            }
        }
        self.load_snippets()
    }

    fn load_snippets(&self) -> SqlCellResult<()> {
        self.store.register_all(
            self.config
                .snippets
                .iter()
                .map(|(name, snippet)| (name.as_str(), snippet.sql.as_str(), snippet.with.as_slice())),
        )
    }

    /// Build the command for one invocation without running it.
    pub fn compose(&self, line: &str, cell: &str) -> SqlCellResult<SqlCommand> {
        command::compose(line, cell, &self.store, &self.connections, &self.config)
    }

    /// Store a snippet. Dependencies may name snippets saved later.
    pub fn save_snippet(&self, name: &str, body: &str, dependencies: &[String]) -> SqlCellResult<()> {
        self.store.register(name, body, dependencies)
    }

    /// Handle one invocation end to end.
    pub fn run<E: Executor>(
        &mut self,
        line: &str,
        cell: &str,
        executor: &mut E,
    ) -> SqlCellResult<Outcome<E::Output>> {
        let command = self.compose(line, cell)?;
        let args = command.args();

        if args.connections {
            return Ok(Outcome::Connections {
                connections: self.connections.list(),
            });
        }

        if let Some(name) = &args.close {
            let connection = self.connections.close(name)?;
            return Ok(Outcome::Closed { connection });
        }

        if let Some(name) = &args.save {
            self.save_snippet(name, command.sql_original(), command.with_list())?;
        }

        if args.no_execute {
            return Ok(Outcome::Skipped { command });
        }

        let connection = self
            .connections
            .resolve(command.connection(), args.alias.as_deref())?;

        if command.sql().is_empty() {
            return Ok(Outcome::Connected { connection });
        }

        tracing::debug!(connection = %connection.name, "executing");
        let output = executor.execute(&connection, command.sql())?;
        Ok(Outcome::Executed { command, output })
    }

    /// Forget every saved snippet, then reload the configured ones.
    pub fn reset(&mut self) -> SqlCellResult<()> {
        self.store.clear();
        self.load_snippets()?;
        tracing::info!("session reset");
        Ok(())
    }

    pub fn store(&self) -> &SnippetStore {
        &self.store
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
