use serde::{Deserialize, Serialize};

/// Engine tuning and execution defaults for a [`ScriptRuntime`](crate::ScriptRuntime).
///
/// Limits of `0` mean "unlimited" for the knobs where Rhai supports it
/// (operations, string, array and map sizes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Maximum number of operations the engine may perform.
    pub max_operations: u64,
    /// Maximum call stack depth.
    pub max_call_levels: usize,
    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,
    /// Maximum depth for function expressions.
    pub max_function_expr_depth: usize,
    /// Maximum size of any string value.
    pub max_string_size: usize,
    /// Maximum size of any array.
    pub max_array_size: usize,
    /// Maximum size of any map.
    pub max_map_size: usize,
    /// Raise an error when a script reads a property a map does not have.
    ///
    /// Off by default so missing properties read as `()`.
    pub fail_on_invalid_map_property: bool,
    /// Number of compiled scripts kept by the runtime's AST cache.
    pub cache_capacity: usize,
    /// Default for [`ExecutionOptions::log`](crate::ExecutionOptions::log).
    pub log_scripts: bool,
    /// Default for [`ExecutionOptions::translate`](crate::ExecutionOptions::translate).
    pub translate: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: 0,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
            fail_on_invalid_map_property: false,
            cache_capacity: 256,
            log_scripts: true,
            translate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ScriptConfig =
            serde_json::from_str(r#"{"log_scripts": false, "max_call_levels": 8}"#).unwrap();
        assert!(!config.log_scripts);
        assert_eq!(config.max_call_levels, 8);
        assert_eq!(config.cache_capacity, ScriptConfig::default().cache_capacity);
        assert!(config.translate);
    }
}
