//! Connection bookkeeping.
//!
//! The registry only tracks which connections exist, what they are called
//! and which one is current. Opening real database sessions is left to the
//! executor that receives a [`ConnectionHandle`].

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{SqlCellError, SqlCellResult};

/// Where an invocation wants to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ConnectionTarget {
    /// An existing connection, by name.
    Live(String),
    /// An alias bound to an existing connection.
    Alias(String),
    /// A connection string to open.
    Dsn(String),
    /// Nothing given: use the current connection.
    #[default]
    None,
}

impl ConnectionTarget {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live(name) => write!(f, "{}", name),
            Self::Alias(alias) => write!(f, "{} (alias)", alias),
            Self::Dsn(url) => write!(f, "{}", url),
            Self::None => write!(f, "(current)"),
        }
    }
}

/// An identified connection, handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionHandle {
    pub name: String,
    pub url: String,
}

/// The connection names an invocation line may refer to.
pub trait ConnectionNamespace {
    fn is_live_connection(&self, name: &str) -> bool;
    fn is_known_alias(&self, name: &str) -> bool;
}

/// One row of `--connections` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub name: String,
    pub url: String,
    pub aliases: Vec<String>,
    pub current: bool,
}

/// Known connections, their aliases, and the current one.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<String, ConnectionHandle>,
    /// alias -> connection name
    aliases: BTreeMap<String, String>,
    current: Option<String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `url` under `name`. The first binding becomes current.
    pub fn bind(&mut self, name: &str, url: &str) -> ConnectionHandle {
        let handle = ConnectionHandle {
            name: name.to_string(),
            url: url.to_string(),
        };
        self.connections.insert(name.to_string(), handle.clone());
        if self.current.is_none() {
            self.current = Some(name.to_string());
        }
        tracing::info!(connection = name, "bound connection");
        handle
    }

    /// Open (or reuse) a connection for `url`, optionally aliased, and make
    /// it current.
    pub fn open(&mut self, url: &str, alias: Option<&str>) -> ConnectionHandle {
        let handle = match self.connections.get(url) {
            Some(existing) => existing.clone(),
            None => {
                let handle = ConnectionHandle {
                    name: url.to_string(),
                    url: url.to_string(),
                };
                self.connections.insert(url.to_string(), handle.clone());
                tracing::info!(url, "opened connection");
                handle
            }
        };

        if let Some(alias) = alias {
            self.set_alias(alias, &handle.name);
        }
        self.current = Some(handle.name.clone());
        handle
    }

    fn set_alias(&mut self, alias: &str, name: &str) {
        if let Some(previous) = self.aliases.insert(alias.to_string(), name.to_string()) {
            if previous != name {
                tracing::warn!(alias, from = %previous, to = name, "alias rebound");
            }
        }
    }

    /// Close a connection by name or alias.
    pub fn close(&mut self, name_or_alias: &str) -> SqlCellResult<ConnectionHandle> {
        let name = self
            .aliases
            .get(name_or_alias)
            .cloned()
            .unwrap_or_else(|| name_or_alias.to_string());

        let handle = self
            .connections
            .remove(&name)
            .ok_or_else(|| SqlCellError::UnknownConnection(name_or_alias.to_string()))?;

        self.aliases.retain(|_, target| *target != name);
        if self.current.as_deref() == Some(name.as_str()) {
            self.current = None;
        }
        tracing::info!(connection = %name, "closed connection");
        Ok(handle)
    }

    /// Turn a target into a handle, opening DSNs as needed. The resolved
    /// connection becomes current.
    pub fn resolve(
        &mut self,
        target: &ConnectionTarget,
        alias: Option<&str>,
    ) -> SqlCellResult<ConnectionHandle> {
        let handle = match target {
            ConnectionTarget::Live(name) => self
                .connections
                .get(name)
                .cloned()
                .ok_or_else(|| SqlCellError::UnknownConnection(name.clone()))?,
            ConnectionTarget::Alias(alias) => self
                .aliases
                .get(alias)
                .and_then(|name| self.connections.get(name))
                .cloned()
                .ok_or_else(|| SqlCellError::UnknownConnection(alias.clone()))?,
            ConnectionTarget::Dsn(url) => return Ok(self.open(url, alias)),
            ConnectionTarget::None => self
                .current()
                .cloned()
                .ok_or(SqlCellError::NoActiveConnection)?,
        };

        if let Some(alias) = alias {
            self.set_alias(alias, &handle.name);
        }
        self.current = Some(handle.name.clone());
        Ok(handle)
    }

    pub fn current(&self) -> Option<&ConnectionHandle> {
        self.current
            .as_ref()
            .and_then(|name| self.connections.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// All connections, sorted by name.
    pub fn list(&self) -> Vec<ConnectionSummary> {
        self.connections
            .values()
            .map(|handle| ConnectionSummary {
                name: handle.name.clone(),
                url: handle.url.clone(),
                aliases: self
                    .aliases
                    .iter()
                    .filter(|(_, target)| **target == handle.name)
                    .map(|(alias, _)| alias.clone())
                    .collect(),
                current: self.current.as_deref() == Some(handle.name.as_str()),
            })
            .collect()
    }
}

impl ConnectionNamespace for ConnectionRegistry {
    fn is_live_connection(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    fn is_known_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }
}
