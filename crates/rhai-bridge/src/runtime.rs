use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use rhai::{AST, Engine, packages::StandardPackage};

use crate::{
    bridge::FunctionBridge, config::ScriptConfig, engine::build_engine, executor::ExecutionOptions,
    translate::TranslatorChain,
};

/// Entry point: prepares scripts against one function bridge and configuration.
///
/// Cloning is cheap; clones share the bridge, translators and compiled script
/// cache. Each execution still gets its own engine and scope.
#[derive(Clone)]
pub struct ScriptRuntime {
    pub(crate) inner: Arc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    pub(crate) bridge: FunctionBridge,
    pub(crate) translators: TranslatorChain,
    pub(crate) builtin: TranslatorChain,
    pub(crate) config: ScriptConfig,
    stdlib: StandardPackage,
    pub(crate) cache: DashMap<Arc<str>, CachedAst>,
    clock: AtomicU64,
}

/// A compiled script and the tick of its last use.
pub(crate) struct CachedAst {
    pub(crate) ast: Arc<AST>,
    pub(crate) last_used: u64,
}

impl RuntimeInner {
    /// Monotonic counter ordering cache uses.
    pub(crate) fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

impl ScriptRuntime {
    /// Runtime with the default configuration and translators.
    pub fn new(bridge: FunctionBridge) -> Self {
        Self::builder(bridge).build()
    }

    /// Start configuring a runtime.
    pub fn builder(bridge: FunctionBridge) -> RuntimeBuilder {
        RuntimeBuilder {
            bridge,
            config: ScriptConfig::default(),
            translators: TranslatorChain::builtin(),
        }
    }

    /// The function bridge scripts are prepared against.
    pub fn bridge(&self) -> &FunctionBridge {
        &self.inner.bridge
    }

    /// The runtime configuration.
    pub fn config(&self) -> &ScriptConfig {
        &self.inner.config
    }

    /// Execution options derived from the configuration.
    pub fn default_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            log: self.inner.config.log_scripts,
            translate: self.inner.config.translate,
        }
    }

    /// Number of compiled scripts currently cached.
    pub fn cached_scripts(&self) -> usize {
        self.inner.cache.len()
    }

    /// Drop every cached compiled script.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// A fresh, isolated engine with host types and the dispatcher bound.
    pub(crate) fn context_engine(&self) -> Engine {
        let mut engine = build_engine(&self.inner.config, &self.inner.stdlib);
        self.inner.bridge.bind(&mut engine, &self.inner.builtin);
        engine
    }
}

impl fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("bridge", &self.inner.bridge)
            .field("translators", &self.inner.translators)
            .field("config", &self.inner.config)
            .field("cached_scripts", &self.inner.cache.len())
            .finish()
    }
}

/// Builder for [`ScriptRuntime`].
pub struct RuntimeBuilder {
    bridge: FunctionBridge,
    config: ScriptConfig,
    translators: TranslatorChain,
}

impl RuntimeBuilder {
    /// Engine and execution configuration.
    pub fn config(mut self, config: ScriptConfig) -> Self {
        self.config = config;
        self
    }

    /// Translators used for deep result decoding.
    ///
    /// Defaults to [`TranslatorChain::builtin`].
    pub fn translators(mut self, translators: TranslatorChain) -> Self {
        self.translators = translators;
        self
    }

    /// Finish.
    pub fn build(self) -> ScriptRuntime {
        ScriptRuntime {
            inner: Arc::new(RuntimeInner {
                bridge: self.bridge,
                translators: self.translators,
                builtin: TranslatorChain::builtin(),
                config: self.config,
                stdlib: StandardPackage::new(),
                cache: DashMap::new(),
                clock: AtomicU64::new(0),
            }),
        }
    }
}
