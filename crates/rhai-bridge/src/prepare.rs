use std::{fmt, sync::Arc};

use rhai::AST;
use tracing::debug;

use crate::{
    error::{ScriptError, ScriptResult},
    runtime::{CachedAst, ScriptRuntime},
};

/// A script ready for repeated execution.
///
/// Holds the final source (preamble plus body) and, when cache-eligible, the
/// compiled AST. Immutable and cheap to clone; every execution opens its own
/// context, so one `Prepared` can be run from many threads at once.
#[derive(Clone)]
pub struct Prepared {
    pub(crate) runtime: ScriptRuntime,
    pub(crate) source: Arc<str>,
    pub(crate) ast: Option<Arc<AST>>,
}

impl Prepared {
    /// Final script text, preamble included.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the compiled form is reused across executions.
    pub fn is_cached(&self) -> bool {
        self.ast.is_some()
    }
}

impl fmt::Debug for Prepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prepared")
            .field("source", &self.source)
            .field("cached", &self.is_cached())
            .finish()
    }
}

impl ScriptRuntime {
    /// Prepare a one-shot script; it is compiled again on every execution.
    pub fn of(&self, script: &str) -> Prepared {
        Prepared {
            runtime: self.clone(),
            source: self.final_source(script).into(),
            ast: None,
        }
    }

    /// Prepare and compile a script for reuse.
    ///
    /// Syntax errors surface here. Compiled scripts are memoised by final text,
    /// so compiling the same script again is a cache hit.
    pub fn compile(&self, script: &str) -> ScriptResult<Prepared> {
        let source: Arc<str> = self.final_source(script).into();
        let ast = self.compiled(&source)?;
        Ok(Prepared {
            runtime: self.clone(),
            source,
            ast: Some(ast),
        })
    }

    fn final_source(&self, script: &str) -> String {
        let preamble = self.bridge().preamble();
        let mut source = String::with_capacity(preamble.len() + script.len() + 3);
        source.push_str(preamble);
        // A leading `{` would parse as a block; force an object map expression.
        if script.starts_with('{') {
            source.push_str("(#");
            source.push_str(script);
            source.push(')');
        } else {
            source.push_str(script);
        }
        source
    }

    /// Compile through the runtime's cache.
    ///
    /// The least recently used entry is evicted once the cache outgrows
    /// `cache_capacity`. Concurrent compiles may overshoot the bound briefly;
    /// every insert trims back down before returning.
    fn compiled(&self, source: &Arc<str>) -> ScriptResult<Arc<AST>> {
        let inner = &self.inner;
        if let Some(mut entry) = inner.cache.get_mut(source) {
            entry.last_used = inner.tick();
            debug!(len = source.len(), "compiled script cache hit");
            return Ok(entry.ast.clone());
        }
        let ast = self
            .context_engine()
            .compile(&**source)
            .map_err(|err| ScriptError::compile(err, source))?;
        let ast = Arc::new(ast);
        let capacity = inner.config.cache_capacity;
        if capacity > 0 {
            inner.cache.insert(
                source.clone(),
                CachedAst {
                    ast: ast.clone(),
                    last_used: inner.tick(),
                },
            );
            while inner.cache.len() > capacity {
                let oldest = inner
                    .cache
                    .iter()
                    .min_by_key(|entry| entry.last_used)
                    .map(|entry| entry.key().clone());
                match oldest {
                    Some(key) => {
                        inner.cache.remove(&key);
                    }
                    None => break,
                }
            }
            debug!(size = inner.cache.len(), "cached compiled script");
        }
        Ok(ast)
    }
}
