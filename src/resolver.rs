//! Snippet dependency resolution.
//!
//! Walks the declared dependencies of the requested snippets depth-first and
//! emits each snippet after everything it depends on.
//!
//! ```text
//! with = [c]          c -> [b, a]      b -> [a]
//!
//! visit c
//! ├── visit b
//! │   └── visit a      emit a
//! │                    emit b
//! ├── visit a          (done, skip)
//! └──                  emit c
//!
//! order: a, b, c
//! ```

use std::collections::HashMap;

use crate::error::{SqlCellError, SqlCellResult};
use crate::store::{Snippet, SnippetSource};

/// One entry of a resolved closure, ready to render as a CTE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSnippet {
    pub name: String,
    pub body: String,
}

impl ResolvedSnippet {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// A snippet being visited and the index of its next dependency.
struct Frame<'a> {
    name: &'a str,
    snippet: &'a Snippet,
    next: usize,
}

struct Resolver<'a, S: SnippetSource + ?Sized> {
    source: &'a S,
    marks: HashMap<&'a str, Mark>,
    /// Snippets currently being visited, outermost first.
    path: Vec<&'a str>,
    order: Vec<ResolvedSnippet>,
}

impl<'a, S: SnippetSource + ?Sized> Resolver<'a, S> {
    fn new(source: &'a S) -> Self {
        Self {
            source,
            marks: HashMap::new(),
            path: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Depth-first walk from `root` on an explicit frame stack, so chain
    /// depth is bounded by the heap rather than the thread stack.
    fn visit(&mut self, root: &'a str) -> SqlCellResult<()> {
        let mut stack: Vec<Frame<'a>> = Vec::new();
        self.enter(root, None, &mut stack)?;

        while let Some(frame) = stack.last_mut() {
            let snippet = frame.snippet;
            match snippet.dependencies.get(frame.next) {
                Some(dep) => {
                    frame.next += 1;
                    let requester = frame.name;
                    self.enter(dep, Some(requester), &mut stack)?;
                }
                None => {
                    let name = frame.name;
                    stack.pop();
                    self.path.pop();
                    self.marks.insert(name, Mark::Done);
                    self.order
                        .push(ResolvedSnippet::new(name, snippet.body.as_str()));
                }
            }
        }

        Ok(())
    }

    /// Open a frame for `name` unless it is already done.
    fn enter(
        &mut self,
        name: &'a str,
        requester: Option<&'a str>,
        stack: &mut Vec<Frame<'a>>,
    ) -> SqlCellResult<()> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(self.cycle_error(name)),
            None => {}
        }

        let source = self.source;
        let snippet = source
            .snippet(name)
            .ok_or_else(|| SqlCellError::unknown_snippet(name, requester))?;

        self.marks.insert(name, Mark::InProgress);
        self.path.push(name);
        stack.push(Frame {
            name,
            snippet,
            next: 0,
        });
        Ok(())
    }

    /// Cycle from the first occurrence of `name` on the path back to itself.
    fn cycle_error(&self, name: &str) -> SqlCellError {
        let start = self.path.iter().position(|n| *n == name).unwrap_or(0);
        let mut cycle: Vec<String> = self.path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_string());
        SqlCellError::CyclicDependency { cycle }
    }
}

/// Resolve the dependency closure of `requested`.
///
/// Every snippet appears once, after all of its dependencies. Discovery
/// order follows `requested` and then each snippet's declared dependency
/// order, so the output is deterministic for a given store. Unknown names
/// and cycles abort the whole resolution.
pub fn resolve<S: SnippetSource + ?Sized>(
    source: &S,
    requested: &[String],
) -> SqlCellResult<Vec<ResolvedSnippet>> {
    let mut resolver = Resolver::new(source);

    for name in requested {
        resolver.visit(name)?;
    }

    tracing::debug!(
        requested = ?requested,
        order = ?resolver.order.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "resolved snippet dependencies"
    );

    Ok(resolver.order)
}
