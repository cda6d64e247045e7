use std::{fmt, sync::Arc};

use rhai::{Array, Blob, Dynamic, FnPtr, Map};

use crate::{codec, value::HostValue};

/// Outcome of one translator applied to one script value.
#[derive(Debug)]
pub enum Translation {
    /// The value is fully decoded; later translators are skipped.
    Resolved(HostValue),
    /// Not handled; the value moves on to the next translator.
    Pass(Dynamic),
}

/// A single decode rule.
///
/// Translators must be free of side effects and must hand back any value they
/// do not recognise as [`Translation::Pass`].
pub trait Translator: Send + Sync {
    /// Try to decode `value`.
    fn translate(&self, value: Dynamic) -> Translation;
}

impl<F> Translator for F
where
    F: Fn(Dynamic) -> Translation + Send + Sync,
{
    fn translate(&self, value: Dynamic) -> Translation {
        self(value)
    }
}

/// Decodes host scalars, dates and passthrough objects via the value codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarTranslator;

impl Translator for ScalarTranslator {
    fn translate(&self, value: Dynamic) -> Translation {
        match codec::decode_scalar(value) {
            Ok(host) => Translation::Resolved(host),
            Err(value) => Translation::Pass(value),
        }
    }
}

/// Ordered list of translators used to decode script results.
///
/// The first translator that resolves a value wins. A value no translator
/// resolves goes to the fallback, which decodes scalars with the codec, turns
/// arrays and maps into host lists and maps (decoding every element through the whole chain
/// again), function pointers into [`HostValue::Callable`], and anything else
/// into its text form. Decoding therefore never yields an unresolved value.
#[derive(Clone)]
pub struct TranslatorChain {
    translators: Arc<[Arc<dyn Translator>]>,
}

impl TranslatorChain {
    /// Chain with exactly the given translators, in order.
    pub fn new(translators: Vec<Arc<dyn Translator>>) -> Self {
        Self {
            translators: translators.into(),
        }
    }

    /// The built-in chain: just [`ScalarTranslator`].
    pub fn builtin() -> Self {
        Self::new(vec![Arc::new(ScalarTranslator) as Arc<dyn Translator>])
    }

    /// A new chain with `translator` appended after the existing ones.
    pub fn with(&self, translator: impl Translator + 'static) -> Self {
        let mut translators = self.translators.to_vec();
        translators.push(Arc::new(translator));
        Self::new(translators)
    }

    /// Number of translators, excluding the fallback.
    pub fn len(&self) -> usize {
        self.translators.len()
    }

    /// Whether only the fallback is present.
    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    /// Decode a script value into a host value.
    pub fn decode(&self, value: Dynamic) -> HostValue {
        let mut value = value;
        for translator in self.translators.iter() {
            match translator.translate(value) {
                Translation::Resolved(host) => return host,
                Translation::Pass(next) => value = next,
            }
        }
        self.fallback(value)
    }

    fn fallback(&self, value: Dynamic) -> HostValue {
        let value = match codec::decode_scalar(value) {
            Ok(host) => return host,
            Err(value) => value,
        };
        if value.is::<Array>() {
            let items = value.try_cast::<Array>().unwrap_or_default();
            return HostValue::List(items.into_iter().map(|item| self.decode(item)).collect());
        }
        if value.is::<Map>() {
            let map = value.try_cast::<Map>().unwrap_or_default();
            return HostValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k.to_string(), self.decode(v)))
                    .collect(),
            );
        }
        if value.is::<Blob>() {
            let bytes = value.try_cast::<Blob>().unwrap_or_default();
            return HostValue::List(bytes.into_iter().map(HostValue::from).collect());
        }
        if value.is::<FnPtr>() {
            return value
                .try_cast::<FnPtr>()
                .map_or(HostValue::Null, |ptr| HostValue::Callable(ptr.fn_name().to_owned()));
        }
        HostValue::String(value.to_string())
    }
}

impl Default for TranslatorChain {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for TranslatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorChain")
            .field("translators", &self.translators.len())
            .finish()
    }
}
