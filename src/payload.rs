//! Deterministic document generators for the exponential series.
//!
//! Every generator takes a branching factor `base` and an exponent `power` and
//! produces a document of logical size `base^power`. Documents always hold a
//! single top-level key; the shape of the value (or of the key itself) is what
//! varies between generators.

use crate::error::{BenchError, Result};
use serde_json::{Map, Value};

/// A document as handed to the store: an ordered key/value mapping.
pub type Document = Map<String, Value>;

/// Filler character used for string-sized payloads.
const FILLER: char = '*';

/// Generated payload: the logical size and the document under test.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub size: u64,
    pub document: Document,
}

/// Payload shape to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorId {
    /// `{"<size>": "****..."}` with `size` filler characters.
    ValueStringSize,
    /// `{"****...": size}` with a key of `size` filler characters.
    KeyStringSize,
    /// `{"<size>": {"0": 0, "1": 1, ...}}` with `size` entries.
    HashSizeFixnum,
    /// `{"<size>": [0, 1, ...]}` with `size` entries.
    ArraySizeFixnum,
    /// `{"<size>": [[...]]}` nested `power` deep, `base` wide.
    ArrayNestFixnum,
    /// `{"<size>": {"0": {...}}}` nested `power` deep, `base` wide.
    HashNestFixnum,
}

impl GeneratorId {
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorId::ValueStringSize => "value_string_size",
            GeneratorId::KeyStringSize => "key_string_size",
            GeneratorId::HashSizeFixnum => "hash_size_fixnum",
            GeneratorId::ArraySizeFixnum => "array_size_fixnum",
            GeneratorId::ArrayNestFixnum => "array_nest_fixnum",
            GeneratorId::HashNestFixnum => "hash_nest_fixnum",
        }
    }

    pub fn generate(&self, base: u32, power: u32) -> Result<Payload> {
        let size = size_of(base, power)?;
        let n = size as usize;
        let (key, value) = match self {
            GeneratorId::ValueStringSize => (size.to_string(), Value::String(filler(n))),
            GeneratorId::KeyStringSize => (filler(n), Value::from(size)),
            GeneratorId::HashSizeFixnum => {
                let entries: Document = (0..size)
                    .map(|i| (i.to_string(), Value::from(i)))
                    .collect();
                (size.to_string(), Value::Object(entries))
            }
            GeneratorId::ArraySizeFixnum => (
                size.to_string(),
                Value::Array((0..size).map(Value::from).collect()),
            ),
            GeneratorId::ArrayNestFixnum => {
                (size.to_string(), array_nest(base, power, Value::from(size)))
            }
            GeneratorId::HashNestFixnum => {
                (size.to_string(), hash_nest(base, power, Value::from(size)))
            }
        };

        let mut document = Document::new();
        document.insert(key, value);
        Ok(Payload { size, document })
    }
}

/// `base^power`, rejecting degenerate bases and sizes that do not fit in memory.
pub fn size_of(base: u32, power: u32) -> Result<u64> {
    if base < 2 {
        return Err(BenchError::InvalidScenario(format!(
            "base must be at least 2, got {base}"
        )));
    }
    u64::from(base)
        .checked_pow(power)
        .filter(|n| usize::try_from(*n).is_ok())
        .ok_or_else(|| BenchError::InvalidScenario(format!("{base}^{power} overflows")))
}

fn filler(n: usize) -> String {
    std::iter::repeat(FILLER).take(n).collect()
}

/// Nest `leaf` inside `level` layers of `base`-wide arrays.
pub fn array_nest(base: u32, level: u32, leaf: Value) -> Value {
    if level == 0 {
        return leaf;
    }
    let inner = array_nest(base, level - 1, leaf);
    Value::Array(vec![inner; base as usize])
}

/// Nest `leaf` inside `level` layers of maps keyed `"0"..base`.
pub fn hash_nest(base: u32, level: u32, leaf: Value) -> Value {
    if level == 0 {
        return leaf;
    }
    let inner = hash_nest(base, level - 1, leaf);
    let map: Document = (0..base).map(|i| (i.to_string(), inner.clone())).collect();
    Value::Object(map)
}
