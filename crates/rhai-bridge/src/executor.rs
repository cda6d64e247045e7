use std::{any::type_name, fmt::Debug, sync::Arc};

use rhai::{AST, Dynamic, Scope, Variant};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{
    codec,
    error::{ScriptError, ScriptResult},
    prepare::Prepared,
    value::HostValue,
};

/// Per-call execution switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Log the script text before evaluation and the decoded result after.
    pub log: bool,
    /// Decode results with the runtime's translator chain instead of the
    /// built-in one.
    pub translate: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            log: true,
            translate: true,
        }
    }
}

impl ExecutionOptions {
    /// Same options with logging switched off.
    pub fn quiet(self) -> Self {
        Self { log: false, ..self }
    }
}

impl Prepared {
    /// Evaluate without variables.
    pub fn run(&self) -> ScriptResult<HostValue> {
        self.eval(Vec::<(String, HostValue)>::new())
    }

    /// Evaluate with variables, using the runtime's default options.
    pub fn eval<I, K, V>(&self, vars: I) -> ScriptResult<HostValue>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HostValue>,
    {
        self.execute(vars, &self.runtime.default_options())
    }

    /// Evaluate with variables and explicit options.
    pub fn execute<I, K, V>(&self, vars: I, options: &ExecutionOptions) -> ScriptResult<HostValue>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HostValue>,
    {
        let chain = if options.translate {
            self.runtime.inner.translators.clone()
        } else {
            self.runtime.inner.builtin.clone()
        };
        self.evaluate(encode_vars(vars), options, |value| Ok(chain.decode(value)))
    }

    /// Evaluate and cast the raw result to a Rhai-native type.
    ///
    /// Fails with [`ScriptError::UnsupportedResultProjection`] when the result
    /// holds a different type.
    pub fn eval_as<T, I, K, V>(&self, vars: I) -> ScriptResult<T>
    where
        T: Variant + Clone + Debug,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HostValue>,
    {
        let options = self.runtime.default_options();
        self.evaluate(encode_vars(vars), &options, |value| {
            let actual = value.type_name().to_string();
            value
                .try_cast::<T>()
                .ok_or_else(|| ScriptError::UnsupportedResultProjection {
                    expected: type_name::<T>().to_string(),
                    actual,
                })
        })
    }

    /// Evaluate, decode, and deserialize the result into `T`.
    pub fn eval_into<T, I, K, V>(&self, vars: I) -> ScriptResult<T>
    where
        T: DeserializeOwned + Debug,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HostValue>,
    {
        let chain = self.runtime.inner.translators.clone();
        let options = self.runtime.default_options();
        self.evaluate(encode_vars(vars), &options, |value| {
            deserialize_host(chain.decode(value))
        })
    }

    /// One execution: open a context, bind, evaluate, project, tear down.
    pub(crate) fn evaluate<T, F>(
        &self,
        vars: Vec<(String, Dynamic)>,
        options: &ExecutionOptions,
        project: F,
    ) -> ScriptResult<T>
    where
        T: Debug,
        F: FnOnce(Dynamic) -> ScriptResult<T>,
    {
        let engine = self.runtime.context_engine();
        let mut scope = Scope::new();
        for (name, value) in vars {
            scope.push_dynamic(name, value);
        }

        if options.log {
            info!("{}", self.source);
        }

        let outcome = match &self.ast {
            Some(ast) => Ok(ast.clone()),
            None => engine
                .compile_with_scope(&scope, &*self.source)
                .map(Arc::new)
                .map_err(|err| ScriptError::compile(err, &self.source)),
        }
        .and_then(|ast: Arc<AST>| {
            engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
                .map_err(|err| ScriptError::execution(err, &self.source))
        })
        .and_then(project);

        match &outcome {
            Ok(result) if options.log => info!("eval result: {result:?}"),
            Err(err) if options.log => warn!("eval failed: {err}"),
            _ => {}
        }
        outcome
    }
}

pub(crate) fn encode_vars<I, K, V>(vars: I) -> Vec<(String, Dynamic)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<HostValue>,
{
    vars.into_iter()
        .map(|(name, value)| (name.into(), codec::encode(value.into())))
        .collect()
}

pub(crate) fn deserialize_host<T: DeserializeOwned>(value: HostValue) -> ScriptResult<T> {
    let json = value.to_json();
    serde_json::from_value(json).map_err(|err| ScriptError::UnsupportedResultProjection {
        expected: type_name::<T>().to_string(),
        actual: format!("{value:?} ({err})"),
    })
}
