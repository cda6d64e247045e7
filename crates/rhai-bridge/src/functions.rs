use chrono::{Local, NaiveDate, NaiveTime};
use tracing::info;

use crate::{
    bridge::{FunctionBridge, FunctionBridgeBuilder, HostFunctions},
    error::{ScriptError, ScriptResult},
    value::HostValue,
};

/// Default host functions available to every script of the shared runtime.
///
/// | function               | result                                  |
/// |------------------------|-----------------------------------------|
/// | `log(value)`           | logs `value` at info level, returns `()` |
/// | `date(y, m, d)`        | `Date`                                  |
/// | `time(h, m, s)`        | `Time`                                  |
/// | `datetime(date, time)` | `DateTime`                              |
/// | `today()`              | current local `Date`                    |
/// | `now()`                | current local `DateTime`                |
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonFunctions;

impl CommonFunctions {
    /// A bridge exposing exactly these functions.
    pub fn bridge() -> ScriptResult<FunctionBridge> {
        FunctionBridge::builder().with(&Self).build()
    }
}

impl HostFunctions for CommonFunctions {
    fn register(&self, builder: FunctionBridgeBuilder) -> FunctionBridgeBuilder {
        builder
            .function("log", 1, log)
            .function("date", 3, date)
            .function("time", 3, time)
            .function("datetime", 2, datetime)
            .function("today", 0, |_| Ok(Local::now().date_naive().into()))
            .function("now", 0, |_| Ok(Local::now().naive_local().into()))
    }
}

fn log(args: &[HostValue]) -> ScriptResult<HostValue> {
    match &args[0] {
        HostValue::String(s) => info!(target: "rhai_bridge::script", "{s}"),
        other => info!(target: "rhai_bridge::script", "{other:?}"),
    }
    Ok(HostValue::Null)
}

fn int_arg(name: &str, args: &[HostValue], index: usize) -> ScriptResult<i64> {
    args[index].as_i64().ok_or_else(|| {
        ScriptError::host(
            name,
            format!("argument {index} must be an integer, got {:?}", args[index]),
        )
    })
}

fn u32_arg(name: &str, args: &[HostValue], index: usize) -> ScriptResult<u32> {
    let value = int_arg(name, args, index)?;
    u32::try_from(value)
        .map_err(|_| ScriptError::host(name, format!("argument {index} out of range: {value}")))
}

fn date(args: &[HostValue]) -> ScriptResult<HostValue> {
    let year = int_arg("date", args, 0)?;
    let year = i32::try_from(year)
        .map_err(|_| ScriptError::host("date", format!("year out of range: {year}")))?;
    let month = u32_arg("date", args, 1)?;
    let day = u32_arg("date", args, 2)?;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(HostValue::Date)
        .ok_or_else(|| ScriptError::host("date", format!("invalid date {year}-{month}-{day}")))
}

fn time(args: &[HostValue]) -> ScriptResult<HostValue> {
    let hour = u32_arg("time", args, 0)?;
    let minute = u32_arg("time", args, 1)?;
    let second = u32_arg("time", args, 2)?;
    NaiveTime::from_hms_opt(hour, minute, second)
        .map(HostValue::Time)
        .ok_or_else(|| {
            ScriptError::host("time", format!("invalid time {hour}:{minute}:{second}"))
        })
}

fn datetime(args: &[HostValue]) -> ScriptResult<HostValue> {
    match (&args[0], &args[1]) {
        (HostValue::Date(d), HostValue::Time(t)) => Ok(HostValue::DateTime(d.and_time(*t))),
        (d, t) => Err(ScriptError::host(
            "datetime",
            format!("expected a date and a time, got {d:?} and {t:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_rejects_invalid_days() {
        let err = date(&[2023.into(), 2.into(), 29.into()]).unwrap_err();
        assert!(err.to_string().contains("invalid date 2023-2-29"), "{err}");
    }

    #[test]
    fn datetime_combines_parts() {
        let d = date(&[2024.into(), 2.into(), 29.into()]).unwrap();
        let t = time(&[12.into(), 30.into(), 0.into()]).unwrap();
        let dt = datetime(&[d, t]).unwrap();
        assert_eq!(
            dt,
            HostValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 2, 29)
                    .unwrap()
                    .and_hms_opt(12, 30, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn bridge_exposes_all_functions() {
        let bridge = CommonFunctions::bridge().unwrap();
        assert_eq!(
            bridge.names().collect::<Vec<_>>(),
            vec!["date", "datetime", "log", "now", "time", "today"]
        );
    }
}
