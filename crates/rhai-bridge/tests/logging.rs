#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
        thread,
    };

    use rhai_bridge::{ExecutionOptions, FunctionBridge, HostValue, ScriptRuntime};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(runtime: &ScriptRuntime, script: &str, options: ExecutionOptions) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let value = runtime
                .of(script)
                .execute(Vec::<(String, HostValue)>::new(), &options)
                .unwrap();
            assert_eq!(value, HostValue::Int(3));
        });
        captured.text()
    }

    #[test]
    fn logging_is_a_per_call_switch() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let quiet = ExecutionOptions::default().quiet();
        let loud = ExecutionOptions::default();
        thread::scope(|s| {
            let silent = s.spawn(|| logged(&runtime, "1 + 2", quiet));
            let chatty = s.spawn(|| logged(&runtime, "2 + 1", loud));

            let silent = silent.join().unwrap();
            assert!(!silent.contains("1 + 2"), "{silent}");
            assert!(!silent.contains("eval result"), "{silent}");

            let chatty = chatty.join().unwrap();
            assert!(chatty.contains("2 + 1"), "{chatty}");
            assert!(chatty.contains("eval result: Int(3)"), "{chatty}");
        });
    }

    #[test]
    fn script_output_is_routed_to_tracing() {
        let runtime = ScriptRuntime::new(FunctionBridge::empty());
        let output = logged(
            &runtime,
            "print(\"hello from script\"); 3",
            ExecutionOptions::default().quiet(),
        );
        assert!(output.contains("hello from script"), "{output}");
    }
}
