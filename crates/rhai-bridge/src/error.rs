use std::sync::Arc;

use rhai::{EvalAltResult, ParseError, Position};
use serde::{Deserialize, Serialize};

/// Serializable error details for script evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptErrorInfo {
    /// Short error category.
    pub error_type: String,
    /// Human-readable error message.
    pub message: String,
    /// Location in the script, when available.
    pub location: Option<String>,
    /// Captured backtrace frames, when available.
    pub backtrace: Option<Vec<String>>,
    /// The script text that failed, when available.
    pub code: Option<String>,
}

/// Result type for script execution.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors that can occur while preparing or running a script.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// The script failed to parse.
    #[error("Parse error: {error}")]
    Compile {
        /// Parser diagnostic.
        error: ParseError,
        /// Final script text, preamble included.
        script: Arc<str>,
    },
    /// The script failed at runtime.
    #[error("Runtime error: {error}")]
    Execution {
        /// Engine diagnostic.
        error: Arc<EvalAltResult>,
        /// Final script text, preamble included.
        script: Arc<str>,
    },
    /// The result does not have the shape the caller asked for.
    #[error("Cannot project {actual} result as {expected}")]
    UnsupportedResultProjection {
        /// Requested type.
        expected: String,
        /// Type the script actually produced.
        actual: String,
    },
    /// A bean field could not be read.
    #[error("Cannot read field '{field}': {reason}")]
    InaccessibleBeanField {
        /// Field path, or `<root>` for the bean itself.
        field: String,
        /// Why it could not be read.
        reason: String,
    },
    /// A host function registration was rejected.
    #[error("Invalid host function '{name}': {reason}")]
    InvalidHostFunction {
        /// Function name as registered.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A host function failed while a script was calling it.
    #[error("Host function '{name}' failed: {message}")]
    HostFunction {
        /// Function name.
        name: String,
        /// Failure details.
        message: String,
        /// Final script text of the call, filled in once the error leaves the
        /// script.
        script: Option<Arc<str>>,
    },
    /// A custom error emitted by the caller.
    #[error("{0}")]
    Custom(String),
}

impl ScriptError {
    /// A host function failure, as returned from a [`HostFn`](crate::HostFn).
    pub fn host(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HostFunction {
            name: name.into(),
            message: message.into(),
            script: None,
        }
    }

    pub(crate) fn compile(error: ParseError, script: &Arc<str>) -> Self {
        Self::Compile {
            error,
            script: script.clone(),
        }
    }

    /// Wrap an engine error, recovering a host error raised inside the script.
    pub(crate) fn execution(error: Box<EvalAltResult>, script: &Arc<str>) -> Self {
        if let Some(mut host) = raised_host_error(&error) {
            if let Self::HostFunction { script: slot, .. } = &mut host {
                slot.get_or_insert_with(|| script.clone());
            }
            return host;
        }
        Self::Execution {
            error: Arc::from(error),
            script: script.clone(),
        }
    }

    /// The script text involved in the failure, when known.
    pub fn script(&self) -> Option<&str> {
        match self {
            Self::Compile { script, .. } | Self::Execution { script, .. } => Some(&**script),
            Self::HostFunction { script, .. } => script.as_deref(),
            _ => None,
        }
    }
}

/// Host errors travel through the engine as a runtime error carrying the
/// original `ScriptError`, possibly wrapped by script function frames.
fn raised_host_error(error: &EvalAltResult) -> Option<ScriptError> {
    match error {
        EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<ScriptError>(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => raised_host_error(inner),
        _ => None,
    }
}

/// Convert a script error to a structured, serializable form.
pub fn format_error(err: &ScriptError) -> ScriptErrorInfo {
    let code = err.script().map(str::to_owned);
    match err {
        ScriptError::Compile { error, .. } => ScriptErrorInfo {
            error_type: "parse".to_string(),
            message: error.to_string(),
            location: format_location(error.position()),
            backtrace: None,
            code,
        },
        ScriptError::Execution { error, .. } => ScriptErrorInfo {
            error_type: "runtime".to_string(),
            message: error.to_string(),
            location: format_location(error.position()),
            backtrace: collect_backtrace(error),
            code,
        },
        ScriptError::UnsupportedResultProjection { .. } => ScriptErrorInfo {
            error_type: "projection".to_string(),
            message: err.to_string(),
            location: None,
            backtrace: None,
            code,
        },
        ScriptError::InaccessibleBeanField { .. } => ScriptErrorInfo {
            error_type: "bean".to_string(),
            message: err.to_string(),
            location: None,
            backtrace: None,
            code,
        },
        ScriptError::InvalidHostFunction { .. } | ScriptError::HostFunction { .. } => {
            ScriptErrorInfo {
                error_type: "host".to_string(),
                message: err.to_string(),
                location: None,
                backtrace: None,
                code,
            }
        }
        ScriptError::Custom(msg) => ScriptErrorInfo {
            error_type: "custom".to_string(),
            message: msg.clone(),
            location: None,
            backtrace: None,
            code,
        },
    }
}

fn format_location(pos: Position) -> Option<String> {
    if pos.is_none() {
        None
    } else {
        Some(format!("line {}", pos.line().unwrap_or(0)))
    }
}

fn collect_backtrace(error: &EvalAltResult) -> Option<Vec<String>> {
    let mut frames = Vec::new();
    let mut current = error;
    while let EvalAltResult::ErrorInFunctionCall(name, _, inner, pos) = current {
        match pos.line() {
            Some(line) => frames.push(format!("at {name} (line {line})")),
            None => frames.push(format!("at {name}")),
        }
        current = inner.as_ref();
    }
    if let Some(line) = current.position().line() {
        frames.push(format!("at <main> (line {line})"));
    }
    if frames.is_empty() {
        None
    } else {
        Some(frames)
    }
}
