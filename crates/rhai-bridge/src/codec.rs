//! Conversion between [`HostValue`] and Rhai's [`Dynamic`].
//!
//! Encoding lowers arbitrary-precision numbers whose magnitude is below
//! `i64::MAX` to `FLOAT`/`INT` so scripts can use plain arithmetic on them.
//! Large-but-in-range decimals still lose fractional digits in the float
//! conversion; this is the accepted default and [`Ref`](crate::Ref) turns it
//! off.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use rhai::{Array, Dynamic, FnPtr, Map};
use rust_decimal::Decimal;

use crate::value::{HostObject, HostValue};

/// Encode a host value for binding into a script.
pub fn encode(value: HostValue) -> Dynamic {
    encode_with(value, true)
}

fn encode_with(value: HostValue, lower: bool) -> Dynamic {
    match value {
        HostValue::Null => Dynamic::UNIT,
        HostValue::Bool(b) => Dynamic::from_bool(b),
        HostValue::Int(i) => Dynamic::from_int(i),
        HostValue::Float(f) => Dynamic::from_float(f),
        HostValue::Decimal(d) if lower => lower_decimal(d),
        HostValue::Decimal(d) => Dynamic::from(d),
        HostValue::BigInt(i) if lower => lower_big_int(i),
        HostValue::BigInt(i) => Dynamic::from(i),
        HostValue::String(s) => Dynamic::from(s),
        HostValue::Date(d) => Dynamic::from(d),
        HostValue::Time(t) => Dynamic::from(t),
        HostValue::DateTime(dt) => Dynamic::from(dt),
        HostValue::List(items) => Dynamic::from_array(
            items
                .into_iter()
                .map(|item| encode_with(item, lower))
                .collect::<Array>(),
        ),
        HostValue::Map(map) => Dynamic::from_map(
            map.into_iter()
                .map(|(k, v)| (k.into(), encode_with(v, lower)))
                .collect::<Map>(),
        ),
        HostValue::Ref(inner) => encode_with(*inner, false),
        HostValue::Opaque(obj) => Dynamic::from(obj),
        HostValue::Callable(name) => match FnPtr::new(name.as_str()) {
            Ok(ptr) => Dynamic::from(ptr),
            Err(_) => Dynamic::from(name),
        },
    }
}

fn lower_decimal(d: Decimal) -> Dynamic {
    if d.abs() < Decimal::from(i64::MAX) {
        if let Some(f) = d.to_f64() {
            return Dynamic::from_float(f);
        }
    }
    Dynamic::from(d)
}

fn lower_big_int(i: BigInt) -> Dynamic {
    if i.abs() < BigInt::from(i64::MAX) {
        if let Some(v) = i.to_i64() {
            return Dynamic::from_int(v);
        }
    }
    Dynamic::from(i)
}

/// Decode a script value that maps directly onto a host scalar.
///
/// Containers, function pointers and unknown types come back as `Err` with the
/// original value so the translator chain can resolve them.
pub fn decode_scalar(value: Dynamic) -> Result<HostValue, Dynamic> {
    if value.is::<NaiveDateTime>() {
        return value.try_cast::<NaiveDateTime>().map(HostValue::DateTime).ok_or(Dynamic::UNIT);
    }
    if value.is::<NaiveDate>() {
        return value.try_cast::<NaiveDate>().map(HostValue::Date).ok_or(Dynamic::UNIT);
    }
    if value.is::<NaiveTime>() {
        return value.try_cast::<NaiveTime>().map(HostValue::Time).ok_or(Dynamic::UNIT);
    }
    if value.is_unit() {
        return Ok(HostValue::Null);
    }
    if value.is::<HostObject>() {
        return value.try_cast::<HostObject>().map(HostValue::Opaque).ok_or(Dynamic::UNIT);
    }
    if value.is_string() {
        return value.into_string().map(HostValue::String).map_err(|_| Dynamic::UNIT);
    }
    if let Ok(c) = value.as_char() {
        return Ok(HostValue::String(c.to_string()));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(HostValue::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(HostValue::Int(i));
    }
    if let Ok(f) = value.as_float() {
        return Ok(HostValue::Float(f));
    }
    if value.is::<Decimal>() {
        return value.try_cast::<Decimal>().map(HostValue::Decimal).ok_or(Dynamic::UNIT);
    }
    if value.is::<BigInt>() {
        return value.try_cast::<BigInt>().map(HostValue::BigInt).ok_or(Dynamic::UNIT);
    }
    Err(value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::value::Ref;

    fn round_trip(value: HostValue) -> HostValue {
        decode_scalar(encode(value)).unwrap()
    }

    #[test]
    fn small_decimal_lowers_to_float() {
        let d: Decimal = "82000".parse().unwrap();
        assert_eq!(round_trip(HostValue::Decimal(d)), HostValue::Float(82000.0));
    }

    #[test]
    fn decimal_at_threshold_keeps_precision() {
        let d = Decimal::from(i64::MAX);
        assert_eq!(round_trip(HostValue::Decimal(d)), HostValue::Decimal(d));
        let negative = -d;
        assert_eq!(round_trip(HostValue::Decimal(negative)), HostValue::Decimal(negative));
    }

    #[test]
    fn big_int_lowers_to_int() {
        assert_eq!(round_trip(HostValue::BigInt(3020.into())), HostValue::Int(3020));
        let huge: BigInt = "98765432109876543210".parse().unwrap();
        assert_eq!(round_trip(HostValue::BigInt(huge.clone())), HostValue::BigInt(huge));
    }

    #[test]
    fn ref_skips_lowering() {
        let d: Decimal = "1.5".parse().unwrap();
        assert_eq!(round_trip(Ref::of(d).into()), HostValue::Decimal(d));
        assert_eq!(round_trip(Ref::of(BigInt::from(7)).into()), HostValue::BigInt(7.into()));
    }

    #[test]
    fn nested_values_are_lowered() {
        let d: Decimal = "2.5".parse().unwrap();
        let encoded = encode(HostValue::List(vec![HostValue::Decimal(d)]));
        let items = encoded.try_cast::<Array>().unwrap();
        assert_eq!(items[0].as_float(), Ok(2.5));
    }

    #[test]
    fn temporal_values_pass_through() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let time = NaiveTime::from_hms_opt(23, 59, 1).unwrap();
        assert_eq!(round_trip(date.into()), HostValue::Date(date));
        assert_eq!(round_trip(time.into()), HostValue::Time(time));
        assert_eq!(
            round_trip(date.and_time(time).into()),
            HostValue::DateTime(date.and_time(time))
        );
    }

    #[test]
    fn containers_are_left_for_the_chain() {
        assert!(decode_scalar(Dynamic::from_array(Array::new())).is_err());
        assert!(decode_scalar(Dynamic::from_map(Map::new())).is_err());
    }

    fn decimal_in_range() -> impl Strategy<Value = Decimal> {
        (any::<i64>(), 0u32..8).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
    }

    fn decimal_out_of_range() -> impl Strategy<Value = Decimal> {
        (i128::from(i64::MAX)..10i128.pow(27), any::<bool>()).prop_map(|(n, negative)| {
            let d = Decimal::from_i128_with_scale(n, 0);
            if negative { -d } else { d }
        })
    }

    proptest! {
        #[test]
        fn in_range_decimals_decode_as_equal_floats(d in decimal_in_range()) {
            prop_assume!(d.abs() < Decimal::from(i64::MAX));
            prop_assert_eq!(round_trip(HostValue::Decimal(d)), HostValue::Float(d.to_f64().unwrap()));
        }

        #[test]
        fn out_of_range_decimals_keep_precision(d in decimal_out_of_range()) {
            prop_assert_eq!(round_trip(HostValue::Decimal(d)), HostValue::Decimal(d));
        }

        #[test]
        fn ref_decimals_never_lower(d in decimal_in_range()) {
            prop_assert_eq!(round_trip(Ref::of(d).into()), HostValue::Decimal(d));
        }
    }
}
