use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_bigint::BigInt;
use rhai::{
    Engine, INT,
    default_limits::MAX_STRINGS_INTERNED,
    packages::{Package, StandardPackage},
};
use tracing::{debug, info};

use crate::{config::ScriptConfig, value::HostObject};

/// Build a fresh engine for one execution context.
pub(crate) fn build_engine(config: &ScriptConfig, stdlib: &StandardPackage) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(stdlib.as_shared_module());

    engine.set_max_strings_interned(MAX_STRINGS_INTERNED);
    engine.set_fail_on_invalid_map_property(config.fail_on_invalid_map_property);

    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_expr_depths(config.max_expr_depth, config.max_function_expr_depth);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_map_size);

    engine.on_print(|text| info!(target: "rhai_bridge::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        debug!(target: "rhai_bridge::script", source, line = pos.line(), "{text}");
    });

    register_host_types(&mut engine);
    engine
}

/// Custom types the codec binds into scripts.
fn register_host_types(engine: &mut Engine) {
    engine
        .register_type_with_name::<NaiveDate>("Date")
        .register_get("year", |d: &mut NaiveDate| INT::from(d.year()))
        .register_get("month", |d: &mut NaiveDate| INT::from(d.month()))
        .register_get("day", |d: &mut NaiveDate| INT::from(d.day()))
        .register_fn("to_string", |d: &mut NaiveDate| d.to_string())
        .register_fn("to_debug", |d: &mut NaiveDate| format!("{d:?}"));

    engine
        .register_type_with_name::<NaiveTime>("Time")
        .register_get("hour", |t: &mut NaiveTime| INT::from(t.hour()))
        .register_get("minute", |t: &mut NaiveTime| INT::from(t.minute()))
        .register_get("second", |t: &mut NaiveTime| INT::from(t.second()))
        .register_fn("to_string", |t: &mut NaiveTime| t.to_string())
        .register_fn("to_debug", |t: &mut NaiveTime| format!("{t:?}"));

    engine
        .register_type_with_name::<NaiveDateTime>("DateTime")
        .register_get("date", |dt: &mut NaiveDateTime| dt.date())
        .register_get("time", |dt: &mut NaiveDateTime| dt.time())
        .register_get("year", |dt: &mut NaiveDateTime| INT::from(dt.year()))
        .register_get("month", |dt: &mut NaiveDateTime| INT::from(dt.month()))
        .register_get("day", |dt: &mut NaiveDateTime| INT::from(dt.day()))
        .register_get("hour", |dt: &mut NaiveDateTime| INT::from(dt.hour()))
        .register_get("minute", |dt: &mut NaiveDateTime| INT::from(dt.minute()))
        .register_get("second", |dt: &mut NaiveDateTime| INT::from(dt.second()))
        .register_fn("to_string", |dt: &mut NaiveDateTime| dt.to_string())
        .register_fn("to_debug", |dt: &mut NaiveDateTime| format!("{dt:?}"));

    engine
        .register_type_with_name::<BigInt>("BigInt")
        .register_fn("+", |a: BigInt, b: BigInt| a + b)
        .register_fn("+", |a: BigInt, b: INT| a + b)
        .register_fn("+", |a: INT, b: BigInt| b + a)
        .register_fn("-", |a: BigInt, b: BigInt| a - b)
        .register_fn("-", |a: BigInt, b: INT| a - b)
        .register_fn("*", |a: BigInt, b: BigInt| a * b)
        .register_fn("*", |a: BigInt, b: INT| a * b)
        .register_fn("==", |a: BigInt, b: BigInt| a == b)
        .register_fn("to_string", |a: &mut BigInt| a.to_string())
        .register_fn("to_debug", |a: &mut BigInt| a.to_string());

    engine.register_type_with_name::<HostObject>("HostObject");
}
