//! Host functions callable from scripts.
//!
//! Every registered function gets a one-line forwarding stub in the bridge's
//! preamble, e.g.
//!
//! ```text
//! fn date(a0, a1, a2) { host_call("date", [a0, a1, a2]) }
//! ```
//!
//! The preamble is generated once per bridge and prepended to every script
//! prepared from it. Each execution context registers a single native
//! dispatcher under [`HOST_BINDING`] that routes the stubs back to the host.

use std::{collections::BTreeMap, fmt, sync::Arc};

use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position};

use crate::{
    codec,
    error::{ScriptError, ScriptResult},
    translate::TranslatorChain,
    value::HostValue,
};

/// Reserved name of the native dispatcher the preamble forwards to.
pub const HOST_BINDING: &str = "host_call";

/// Rhai keywords, reserved words and built-ins that cannot be redefined.
pub(crate) const RESERVED: &[&str] = &[
    "let", "const", "if", "else", "switch", "do", "while", "loop", "until", "for", "in",
    "continue", "break", "return", "throw", "try", "catch", "import", "export", "as", "global",
    "private", "fn", "Fn", "call", "curry", "this", "type_of", "print", "debug", "eval",
    "is_def_var", "is_def_fn", "is_shared", "true", "false", "var", "static", "shared", "goto",
    "exit", "match", "case", "public", "protected", "new", "use", "with", "module", "package",
    "super", "thread", "spawn", "go", "await", "async", "sync", "yield", "default", "void",
    "null", "nil", HOST_BINDING,
];

/// Signature of a host function.
pub type HostFn = dyn Fn(&[HostValue]) -> ScriptResult<HostValue> + Send + Sync;

/// A group of host functions registered together.
///
/// This is the extension point for host "functions objects": implement it on a
/// type and add it to a bridge with [`FunctionBridgeBuilder::with`].
pub trait HostFunctions {
    /// Add this group's functions to the builder.
    fn register(&self, builder: FunctionBridgeBuilder) -> FunctionBridgeBuilder;
}

#[derive(Clone)]
struct HostFunction {
    arity: usize,
    func: Arc<HostFn>,
}

/// Registry of host functions plus their generated preamble.
///
/// Cloning is cheap and clones share the same functions.
#[derive(Clone)]
pub struct FunctionBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    functions: BTreeMap<String, HostFunction>,
    preamble: String,
}

impl FunctionBridge {
    /// Start registering functions.
    pub fn builder() -> FunctionBridgeBuilder {
        FunctionBridgeBuilder::default()
    }

    /// A bridge with no functions and an empty preamble.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                functions: BTreeMap::new(),
                preamble: String::new(),
            }),
        }
    }

    /// Forwarding stubs prepended to every script.
    pub fn preamble(&self) -> &str {
        &self.inner.preamble
    }

    /// Registered function names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.functions.keys().map(String::as_str)
    }

    /// Invoke a host function directly.
    pub fn call(&self, name: &str, args: &[HostValue]) -> ScriptResult<HostValue> {
        let function = self
            .inner
            .functions
            .get(name)
            .ok_or_else(|| ScriptError::host(name, "no such function"))?;
        if args.len() != function.arity {
            return Err(ScriptError::host(
                name,
                format!("expected {} arguments, got {}", function.arity, args.len()),
            ));
        }
        (function.func)(args)
    }

    /// Register the dispatcher on a context engine.
    pub(crate) fn bind(&self, engine: &mut Engine, decoder: &TranslatorChain) {
        let bridge = self.clone();
        let decoder = decoder.clone();
        engine.register_fn(
            HOST_BINDING,
            move |name: ImmutableString, args: Array| -> Result<Dynamic, Box<EvalAltResult>> {
                let args: Vec<HostValue> = args.into_iter().map(|arg| decoder.decode(arg)).collect();
                bridge
                    .call(name.as_str(), &args)
                    .map(codec::encode)
                    .map_err(|err| {
                        Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(err), Position::NONE))
                    })
            },
        );
    }
}

impl fmt::Debug for FunctionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionBridge")
            .field("functions", &self.inner.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`FunctionBridge`].
#[derive(Default)]
pub struct FunctionBridgeBuilder {
    functions: Vec<(String, HostFunction)>,
}

impl FunctionBridgeBuilder {
    /// Register a function taking exactly `arity` arguments.
    pub fn function<F>(mut self, name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&[HostValue]) -> ScriptResult<HostValue> + Send + Sync + 'static,
    {
        self.functions.push((
            name.into(),
            HostFunction {
                arity,
                func: Arc::new(func),
            },
        ));
        self
    }

    /// Register a group of functions.
    pub fn with(self, functions: &impl HostFunctions) -> Self {
        functions.register(self)
    }

    /// Validate the registrations and generate the preamble.
    pub fn build(self) -> ScriptResult<FunctionBridge> {
        let mut functions = BTreeMap::new();
        for (name, function) in self.functions {
            validate_name(&name)?;
            if functions.contains_key(&name) {
                return Err(ScriptError::InvalidHostFunction {
                    name,
                    reason: "registered twice".to_string(),
                });
            }
            functions.insert(name, function);
        }
        let preamble = functions
            .iter()
            .map(|(name, function)| stub(name, function.arity))
            .collect();
        Ok(FunctionBridge {
            inner: Arc::new(BridgeInner {
                functions,
                preamble,
            }),
        })
    }
}

fn stub(name: &str, arity: usize) -> String {
    let params = (0..arity)
        .map(|i| format!("a{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("fn {name}({params}) {{ {HOST_BINDING}(\"{name}\", [{params}]) }}\n")
}

fn validate_name(name: &str) -> ScriptResult<()> {
    let invalid = |reason: &str| ScriptError::InvalidHostFunction {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return Err(invalid("must start with a letter or underscore")),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("must contain only letters, digits and underscores"));
    }
    if name.chars().all(|c| c == '_') {
        return Err(invalid("must contain a letter or digit"));
    }
    if RESERVED.contains(&name) {
        return Err(invalid("is a reserved word"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn echo(args: &[HostValue]) -> ScriptResult<HostValue> {
        Ok(HostValue::List(args.to_vec()))
    }

    #[test]
    fn preamble_has_one_stub_per_function() {
        let bridge = FunctionBridge::builder()
            .function("pair", 2, echo)
            .function("nothing", 0, echo)
            .build()
            .unwrap();
        assert_eq!(
            bridge.preamble(),
            "fn nothing() { host_call(\"nothing\", []) }\n\
             fn pair(a0, a1) { host_call(\"pair\", [a0, a1]) }\n"
        );
        assert_eq!(bridge.names().collect::<Vec<_>>(), vec!["nothing", "pair"]);
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["1abc", "a-b", "print", HOST_BINDING, "", "__"] {
            let err = FunctionBridge::builder()
                .function(name, 1, echo)
                .build()
                .unwrap_err();
            assert!(
                matches!(err, ScriptError::InvalidHostFunction { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = FunctionBridge::builder()
            .function("twice", 1, echo)
            .function("twice", 2, echo)
            .build()
            .unwrap_err();
        assert!(matches!(err, ScriptError::InvalidHostFunction { reason, .. } if reason == "registered twice"));
    }

    #[test]
    fn direct_call_checks_arity() {
        let bridge = FunctionBridge::builder()
            .function("pair", 2, echo)
            .build()
            .unwrap();
        assert_eq!(
            bridge.call("pair", &[1.into(), 2.into()]).unwrap(),
            HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)])
        );
        assert!(bridge.call("pair", &[1.into()]).is_err());
        assert!(bridge.call("missing", &[]).is_err());
    }
}
