//! Rules store (spec.md §4.4): a single slot holding the currently-active
//! compiled rules program, behind a lock, with atomic replacement.
//! Grounded on `original_source/turq/mock.py::MockServer.set_rules`.

use std::sync::{Arc, RwLock};

use crate::error::CompileError;

/// An opaque compiled rules program plus its source text (spec.md §3).
#[derive(Clone)]
pub struct Program {
    pub source: String,
    pub ast: Arc<rhai::AST>,
}

impl Program {
    pub fn compile(source: &str) -> Result<Program, CompileError> {
        let engine = rhai::Engine::new();
        let ast = engine.compile(source).map_err(|err| {
            let pos = err.position();
            CompileError {
                line: pos.line().unwrap_or(0),
                column: pos.position().unwrap_or(0),
                message: err.to_string(),
            }
        })?;
        Ok(Program { source: source.to_string(), ast: Arc::new(ast) })
    }
}

/// The default rules program installed at startup unless `--rules` is
/// given (spec.md §6): `error(404)`.
pub const DEFAULT_RULES: &str = "error(404);\n";

/// Many readers, single writer (spec.md §5). Reads are a short `Arc`
/// clone; writes replace the whole `Arc` atomically.
pub struct RulesStore {
    current: RwLock<Arc<Program>>,
}

impl RulesStore {
    pub fn new(initial: Program) -> RulesStore {
        RulesStore { current: RwLock::new(Arc::new(initial)) }
    }

    /// Compile `source` and, on success, atomically replace the active
    /// program. On failure the current program is left untouched (spec.md
    /// §4.4, §7).
    pub fn install(&self, source: &str) -> Result<(), CompileError> {
        let program = Program::compile(source)?;
        *self.current.write().expect("rules store lock poisoned") = Arc::new(program);
        log::info!("new rules installed");
        Ok(())
    }

    /// One snapshot per cycle (spec.md §4.2 step c): a connection never
    /// tears a hot reload mid-cycle.
    pub fn current(&self) -> Arc<Program> {
        self.current.read().expect("rules store lock poisoned").clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compile_failure_leaves_store_unchanged() {
        let store = RulesStore::new(Program::compile(DEFAULT_RULES).unwrap());
        let before = store.current().source.clone();
        assert!(store.install("status(").is_err());
        assert_eq!(store.current().source, before);
    }

    #[test]
    fn install_replaces_atomically() {
        let store = RulesStore::new(Program::compile(DEFAULT_RULES).unwrap());
        store.install("status(200);\n").unwrap();
        assert_eq!(store.current().source, "status(200);\n");
    }
}
