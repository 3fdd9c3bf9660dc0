//! # sqlcell — ad-hoc SQL cells with composable snippets
//!
//! sqlcell turns a short invocation (a line of flags plus optional cell
//! text) into a SQL statement and a connection to run it on. Queries can be
//! saved under a name and pulled into later queries as CTEs.
//!
//! ## Quick Example
//!
//! ```
//! use sqlcell::prelude::*;
//!
//! let session = Session::new(Config::default()).unwrap();
//! session.save_snippet("a", "SELECT 1", &[]).unwrap();
//! session.save_snippet("b", "SELECT * FROM a", &["a".to_string()]).unwrap();
//!
//! let cmd = session.compose("--with b", "SELECT * FROM b").unwrap();
//! assert_eq!(
//!     cmd.sql(),
//!     "WITH a AS (SELECT 1), b AS (SELECT * FROM a) SELECT * FROM b"
//! );
//! assert_eq!(cmd.sql_original(), "SELECT * FROM b");
//! ```
//!
//! ## Invocation flags
//!
//! | Flag              | Function                                  |
//! |-------------------|-------------------------------------------|
//! | `-S`, `--save`    | Store the query under a name              |
//! | `--with`          | Compose a saved snippet as a CTE          |
//! | `-N`, `--no-execute` | Compose (and save) without running     |
//! | `-f`, `--file`    | Prepend SQL read from a file              |
//! | `-A`, `--alias`   | Name a newly opened connection            |
//! | `-s`, `--section` | Connect through a DSN section             |
//! | `-l`, `--connections` | List connections                      |
//! | `-x`, `--close`   | Close a connection                        |

pub mod args;
pub mod classifier;
pub mod command;
pub mod compiler;
pub mod config;
pub mod connection;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod session;
pub mod store;

pub mod prelude {
    pub use crate::command::{BodySource, SqlCommand};
    pub use crate::compiler::ToSql;
    pub use crate::config::Config;
    pub use crate::connection::{
        ConnectionHandle, ConnectionNamespace, ConnectionRegistry, ConnectionTarget,
    };
    pub use crate::error::*;
    pub use crate::resolver::ResolvedSnippet;
    pub use crate::session::{Executor, Outcome, Session};
    pub use crate::store::SnippetStore;
}

pub use command::compose;
