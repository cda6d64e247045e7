//! Many rows, one evaluation.
//!
//! A batch wraps the per-row work in a closure and loops it over every row
//! inside a single script, so compilation and context setup are paid once for
//! the whole batch. For variables `a, b` the generated body reads:
//!
//! ```text
//! let host_batch_vars = ["a", "b"];
//! <setup>
//! let host_batch_fn = |a, b| {
//! <calc>
//! <result>
//! };
//! let host_batch_out = [];
//! for host_batch_row in host_batch_rows {
//!     host_batch_out.push(host_batch_fn.call(host_batch_row.get(host_batch_vars[0]), host_batch_row.get(host_batch_vars[1])));
//! }
//! host_batch_out
//! ```
//!
//! A closure is used rather than a script function because only closures see
//! the variables the setup script defines.

use std::{collections::BTreeMap, fmt, fmt::Write as _};

use rhai::{Array, Dynamic};
use serde::de::DeserializeOwned;

use crate::{
    bridge::RESERVED,
    codec,
    error::{ScriptError, ScriptResult},
    executor::{ExecutionOptions, deserialize_host},
    runtime::ScriptRuntime,
    value::HostValue,
};

const ROWS: &str = "host_batch_rows";

/// Variables of one batch row, by name.
pub type BatchRow = BTreeMap<String, HostValue>;

/// A result expression with optional setup and per-row statements.
#[derive(Clone)]
pub struct PreparedBatch {
    runtime: ScriptRuntime,
    setup: Option<String>,
    calc: Option<String>,
    result: String,
}

impl PreparedBatch {
    /// Script run once before the first row.
    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = Some(setup.into());
        self
    }

    /// Statement run for every row before the result expression.
    pub fn with_calc(mut self, calc: impl Into<String>) -> Self {
        self.calc = Some(calc.into());
        self
    }

    /// The generated script body for the given variable names, preamble
    /// excluded.
    pub fn script<S: AsRef<str>>(&self, var_names: &[S]) -> ScriptResult<String> {
        for name in var_names {
            validate_var(name.as_ref())?;
        }
        let names: Vec<&str> = var_names.iter().map(|n| n.as_ref()).collect();
        let mut body = String::new();

        let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
        writeln!(body, "let host_batch_vars = [{}];", quoted.join(", ")).ok();
        if let Some(setup) = &self.setup {
            body.push_str(&terminated(setup));
            body.push('\n');
        }
        writeln!(body, "let host_batch_fn = |{}| {{", names.join(", ")).ok();
        if let Some(calc) = &self.calc {
            body.push_str(&terminated(calc));
            body.push('\n');
        }
        // Same object-literal rule as a prepared script body.
        if self.result.starts_with('{') {
            body.push('#');
        }
        body.push_str(&self.result);
        body.push_str("\n};\n");
        body.push_str("let host_batch_out = [];\n");
        writeln!(body, "for host_batch_row in {ROWS} {{").ok();
        let args: Vec<String> = (0..names.len())
            .map(|i| format!("host_batch_row.get(host_batch_vars[{i}])"))
            .collect();
        writeln!(
            body,
            "    host_batch_out.push(host_batch_fn.call({}));",
            args.join(", ")
        )
        .ok();
        body.push_str("}\nhost_batch_out");
        Ok(body)
    }

    /// Evaluate every row and decode each result.
    ///
    /// Variables a row does not supply read as `()`.
    pub fn eval_batch<S: AsRef<str>>(
        &self,
        var_names: &[S],
        rows: &[BatchRow],
    ) -> ScriptResult<Vec<HostValue>> {
        self.execute_batch(var_names, rows, &self.runtime.default_options())
    }

    /// [`eval_batch`](Self::eval_batch) with explicit options.
    pub fn execute_batch<S: AsRef<str>>(
        &self,
        var_names: &[S],
        rows: &[BatchRow],
        options: &ExecutionOptions,
    ) -> ScriptResult<Vec<HostValue>> {
        let prepared = self.runtime.compile(&self.script(var_names)?)?;
        let chain = if options.translate {
            self.runtime.inner.translators.clone()
        } else {
            self.runtime.inner.builtin.clone()
        };
        let rows = HostValue::List(rows.iter().cloned().map(HostValue::Map).collect());
        prepared.evaluate(
            vec![(ROWS.to_string(), codec::encode(rows))],
            options,
            |value: Dynamic| {
                let actual = value.type_name().to_string();
                let results = value.try_cast::<Array>().ok_or_else(|| {
                    ScriptError::UnsupportedResultProjection {
                        expected: "array".to_string(),
                        actual,
                    }
                })?;
                Ok(results.into_iter().map(|item| chain.decode(item)).collect())
            },
        )
    }

    /// Evaluate every row and deserialize each result into `T`.
    pub fn eval_batch_into<T, S>(&self, var_names: &[S], rows: &[BatchRow]) -> ScriptResult<Vec<T>>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        self.eval_batch(var_names, rows)?
            .into_iter()
            .map(deserialize_host)
            .collect()
    }
}

impl fmt::Debug for PreparedBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedBatch")
            .field("setup", &self.setup)
            .field("calc", &self.calc)
            .field("result", &self.result)
            .finish()
    }
}

impl ScriptRuntime {
    /// Start a batch around a result expression.
    pub fn batch(&self, result_expression: impl Into<String>) -> PreparedBatch {
        PreparedBatch {
            runtime: self.clone(),
            setup: None,
            calc: None,
            result: result_expression.into(),
        }
    }
}

/// Statements need a terminator before the next generated line.
fn terminated(statement: &str) -> String {
    let trimmed = statement.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(';') || trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

fn validate_var(name: &str) -> ScriptResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("host_batch_")
        && !RESERVED.contains(&name);
    if valid {
        Ok(())
    } else {
        Err(ScriptError::Custom(format!(
            "invalid batch variable name '{name}'"
        )))
    }
}
