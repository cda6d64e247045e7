//! A process-wide runtime over [`CommonFunctions`].
//!
//! ```no_run
//! use rhai_bridge::{HostValue, shared};
//!
//! let value = shared::of("1 + a0").eval([("a0", 1)]).unwrap();
//! assert_eq!(value, HostValue::Int(2));
//! ```

use std::sync::OnceLock;

use tracing::error;

use crate::{
    batch::PreparedBatch, bridge::FunctionBridge, error::ScriptResult, functions::CommonFunctions,
    prepare::Prepared, runtime::ScriptRuntime,
};

static RUNTIME: OnceLock<ScriptRuntime> = OnceLock::new();

/// The shared runtime, built on first use.
pub fn runtime() -> &'static ScriptRuntime {
    RUNTIME.get_or_init(|| {
        let bridge = CommonFunctions::bridge().unwrap_or_else(|err| {
            error!("common functions rejected: {err}");
            FunctionBridge::empty()
        });
        ScriptRuntime::new(bridge)
    })
}

/// [`ScriptRuntime::of`] on the shared runtime.
pub fn of(script: &str) -> Prepared {
    runtime().of(script)
}

/// [`ScriptRuntime::compile`] on the shared runtime.
pub fn compile(script: &str) -> ScriptResult<Prepared> {
    runtime().compile(script)
}

/// [`ScriptRuntime::batch`] on the shared runtime.
pub fn batch(result_expression: impl Into<String>) -> PreparedBatch {
    runtime().batch(result_expression)
}
