#![warn(missing_docs)]

//! Run Rhai scripts against host values.
//!
//! This crate marshals host values into a script, exposes a fixed set of host
//! functions to it, and decodes the result back into [`HostValue`] trees. A
//! batch mode evaluates many input rows in a single script run.
//!
//! ```no_run
//! use rhai_bridge::{CommonFunctions, HostValue, ScriptRuntime};
//!
//! let runtime = ScriptRuntime::new(CommonFunctions::bridge().unwrap());
//! let value = runtime.of("{a: 1, b: [x, 2]}").eval([("x", "text")]).unwrap();
//! assert_eq!(value.get("a"), Some(&HostValue::Int(1)));
//! ```

mod batch;
pub mod bean;
mod bridge;
pub mod codec;
mod config;
mod engine;
mod error;
mod executor;
mod functions;
mod prepare;
mod runtime;
pub mod shared;
mod translate;
mod value;

pub use batch::{BatchRow, PreparedBatch};
pub use bean::flatten_bean;
pub use bridge::{FunctionBridge, FunctionBridgeBuilder, HOST_BINDING, HostFn, HostFunctions};
pub use config::ScriptConfig;
pub use error::{ScriptError, ScriptErrorInfo, ScriptResult, format_error};
pub use executor::ExecutionOptions;
pub use functions::CommonFunctions;
pub use prepare::Prepared;
pub use runtime::{RuntimeBuilder, ScriptRuntime};
pub use translate::{ScalarTranslator, Translation, Translator, TranslatorChain};
pub use value::{HostObject, HostValue, Ref};

pub use rhai;
