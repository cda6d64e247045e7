#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    };

    use pretty_assertions::assert_eq;
    use rhai_bridge::{BatchRow, CommonFunctions, FunctionBridge, HostValue, ScriptRuntime};
    use serde::Deserialize;

    fn row(pairs: &[(&str, i64)]) -> BatchRow {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), HostValue::Int(*value)))
            .collect()
    }

    #[test]
    fn setup_variables_are_visible_to_every_row() {
        let runtime = ScriptRuntime::new(CommonFunctions::bridge().unwrap());
        let rows = [row(&[("a", 88), ("b", 888)]), row(&[("a", 880), ("b", 8880)])];
        let results = runtime
            .batch("s + a")
            .with_setup("let s = 100;")
            .eval_batch(&["a", "b"], &rows)
            .unwrap();
        assert_eq!(results, vec![HostValue::Int(188), HostValue::Int(980)]);
    }

    #[test]
    fn setup_runs_once_per_batch() {
        let calls = Arc::new(AtomicI64::new(0));
        let counter = calls.clone();
        let bridge = FunctionBridge::builder()
            .function("tick", 0, move |_| {
                Ok(HostValue::Int(counter.fetch_add(1, Ordering::SeqCst) + 1))
            })
            .build()
            .unwrap();
        let runtime = ScriptRuntime::new(bridge);
        let rows: Vec<BatchRow> = (0..5).map(|i| row(&[("a", i)])).collect();
        let results = runtime
            .batch("base + a")
            .with_setup("let base = tick() * 10")
            .eval_batch(&["a"], &rows)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            results,
            (10..15).map(HostValue::Int).collect::<Vec<_>>()
        );
    }

    #[test]
    fn calc_runs_per_row() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let rows = [row(&[("a", 2), ("b", 3)]), row(&[("a", 4), ("b", 5)])];
        let results = runtime
            .batch("product + 1")
            .with_calc("let product = a * b")
            .eval_batch(&["a", "b"], &rows)
            .unwrap();
        assert_eq!(results, vec![HostValue::Int(7), HostValue::Int(21)]);
    }

    #[test]
    fn missing_row_variables_read_as_unit() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let results = runtime
            .batch("b")
            .eval_batch(&["a", "b"], &[row(&[("a", 1)])])
            .unwrap();
        assert_eq!(results, vec![HostValue::Null]);
    }

    #[test]
    fn object_literal_results() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let results = runtime
            .batch("{total: q * 2}")
            .eval_batch(&["q"], &[row(&[("q", 4)])])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("total"), Some(&HostValue::Int(8)));
    }

    #[test]
    fn empty_batch_yields_no_results() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let results = runtime.batch("a").eval_batch(&["a"], &[]).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn batch_script_is_compiled_once() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let batch = runtime.batch("a * 2");
        for i in 0..3 {
            batch.eval_batch(&["a"], &[row(&[("a", i)])]).unwrap();
        }
        assert_eq!(runtime.cached_scripts(), 1);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Line {
        total: i64,
        label: String,
    }

    #[test]
    fn rows_deserialize_into_structs() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let lines: Vec<Line> = runtime
            .batch("#{total: q * 3, label: `row ${q}`}")
            .eval_batch_into(&["q"], &[row(&[("q", 1)]), row(&[("q", 2)])])
            .unwrap();
        assert_eq!(
            lines,
            vec![
                Line {
                    total: 3,
                    label: "row 1".into()
                },
                Line {
                    total: 6,
                    label: "row 2".into()
                },
            ]
        );
    }
}
