//! Value encoder
//!
//! The encoder owns a [`Sink`], the per-call [`Memory`] and a handle to the
//! class registry. Primitive writers are public so that hand-written
//! dispatchers and tests can lay out bytes directly; composite values go
//! through a compiled [`Program`](crate::dispatch::Program).

use std::sync::Arc;

use num_bigint::{BigInt, Sign};

use crate::buffer::{GrowableBuffer, Sink};
use crate::config::Config;
use crate::dispatch::{self, Members, Node, NodeId, Program};
use crate::error::{Error, Result};
use crate::infer::Inference;
use crate::memory::{is_memorable, Memory};
use crate::registry::Registry;
use crate::tag::{Kind, END_OF_STRING, NULL, REFERENCE, START, STRING_REFERENCE, UNDEFINED};
use crate::value::{Object, RegExp, Value};
use crate::varint::{self, MAX_VARINT_SIGNED_SIZE, MAX_VARINT_U64_SIZE};

/// Exclusive bound on magnitudes that fit a 64-bit varint
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Encoder writing into a [`Sink`]
pub struct Encoder<S: Sink = GrowableBuffer> {
    sink: S,
    memory: Memory,
    registry: Registry,
    max_depth: usize,
    depth: usize,
}

impl Encoder<GrowableBuffer> {
    /// Encoder over a growable buffer sized by `config`
    pub fn new(registry: Registry, config: &Config) -> Self {
        let sink = GrowableBuffer::new(config.initial_capacity, config.base_capacity);
        Self::with_sink(sink, registry, config)
    }

    /// Finish encoding and take the bytes
    pub fn finish(self) -> Vec<u8> {
        self.sink.into_bytes()
    }
}

impl<S: Sink> Encoder<S> {
    /// Encoder over any sink
    pub fn with_sink(sink: S, registry: Registry, config: &Config) -> Self {
        Self {
            sink,
            memory: Memory::new(),
            registry,
            max_depth: config.max_depth,
            depth: 0,
        }
    }

    /// Replace the dedup tables (used to seed string memory)
    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    /// Dedup tables of this call
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Class registry consulted for instances
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get current position in the sink
    #[inline]
    pub fn position(&self) -> usize {
        self.sink.position()
    }

    /// Borrow the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Take the sink back
    pub fn into_sink(self) -> S {
        self.sink
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Write a u8 value
    #[inline]
    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.sink.write_byte(value)
    }

    /// Write raw bytes without length prefix
    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_bytes(bytes)
    }

    /// Write a varint-encoded u64
    #[inline]
    pub fn put_positive(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_U64_SIZE];
        let len = varint::encode_u64(value, &mut buf)?;
        self.sink.write_bytes(&buf[..len])
    }

    /// Write a sign and magnitude as a signed varint
    #[inline]
    pub fn put_signed(&mut self, negative: bool, magnitude: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_SIGNED_SIZE];
        let len = varint::encode_signed(negative, magnitude, &mut buf)?;
        self.sink.write_bytes(&buf[..len])
    }

    /// Write an integral number; `-0` keeps its sign
    pub fn put_integer(&mut self, value: f64) -> Result<()> {
        if !fits_varint(value) {
            return Err(Error::TypeMismatch {
                expected: Kind::Integer.name(),
                found: "number",
            });
        }
        self.put_signed(value.is_sign_negative(), value.abs() as u64)
    }

    /// Write a non-negative integral number
    pub fn put_positive_integer(&mut self, value: f64) -> Result<()> {
        if !fits_varint(value) || value < 0.0 {
            return Err(Error::TypeMismatch {
                expected: Kind::PositiveInteger.name(),
                found: "number",
            });
        }
        self.put_positive(value as u64)
    }

    /// Write an arbitrary-precision integer
    pub fn put_big(&mut self, value: &BigInt) -> Result<()> {
        let (sign, magnitude) = value.to_bytes_le();
        let mut buf = Vec::with_capacity(magnitude.len() + 2);
        varint::encode_big(sign == Sign::Minus, &magnitude, &mut buf);
        self.sink.write_bytes(&buf)
    }

    /// Write an f64 value (little-endian)
    #[inline]
    pub fn put_f64(&mut self, value: f64) -> Result<()> {
        self.sink.write_bytes(&value.to_le_bytes())
    }

    /// Write a string, or a back-reference to an earlier equal one
    ///
    /// Literal strings are UTF-8 with NUL written as `C0 80`, terminated by a
    /// zero byte.
    pub fn put_string(&mut self, s: &str) -> Result<()> {
        if is_memorable(s) {
            if let Some(index) = self.memory.remember_string(s) {
                self.put_u8(STRING_REFERENCE)?;
                return self.put_positive(index as u64);
            }
        }

        if !s.contains('\0') {
            self.put_bytes(s.as_bytes())?;
        } else {
            for (i, part) in s.split('\0').enumerate() {
                if i > 0 {
                    self.put_bytes(&[0xC0, 0x80])?;
                }
                self.put_bytes(part.as_bytes())?;
            }
        }
        self.put_u8(END_OF_STRING)
    }

    /// Write a single character as its code point
    #[inline]
    pub fn put_char(&mut self, c: char) -> Result<()> {
        self.put_positive(u64::from(u32::from(c)))
    }

    /// Write variable-length bytes with length prefix
    pub fn put_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_positive(bytes.len() as u64)?;
        self.put_bytes(bytes)
    }

    /// Write epoch milliseconds
    #[inline]
    pub fn put_date(&mut self, millis: i64) -> Result<()> {
        self.put_signed(millis < 0, millis.unsigned_abs())
    }

    /// Write a regular expression as source then flags
    pub fn put_regexp(&mut self, regexp: &RegExp) -> Result<()> {
        self.put_string(&regexp.source)?;
        self.put_string(&regexp.flags)
    }

    /// Write `value` with an inline schema ahead of it
    pub fn put_any(&mut self, value: &Value) -> Result<()> {
        let schema = Inference::new(Some(&self.registry))
            .with_max_depth(self.max_depth)
            .infer(value)?;
        let dispatcher = dispatch::compile_schema(&schema, self)?;
        dispatcher.encode(value, self)
    }

    /// Write `value` through `node`; only composites count against the
    /// depth limit
    pub(crate) fn write(&mut self, program: &Program, node: NodeId, value: &Value) -> Result<()> {
        if !program.node(node).is_composite() {
            return self.write_node(program, node, value);
        }
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimit(self.max_depth));
        }
        self.depth += 1;
        let result = self.write_node(program, node, value);
        self.depth -= 1;
        result
    }

    fn write_node(&mut self, program: &Program, node: NodeId, value: &Value) -> Result<()> {
        match program.node(node) {
            Node::Leaf(kind) => self.write_leaf(*kind, value),
            Node::Nullable(inner) => match value {
                Value::Null => self.put_u8(NULL),
                Value::Undefined => self.put_u8(UNDEFINED),
                _ => {
                    self.put_u8(START)?;
                    self.write(program, *inner, value)
                }
            },
            Node::Tuple(items) => {
                let Value::Array(array) = value else {
                    return Err(mismatch(Kind::Tuple, value));
                };
                let array = array.borrow();
                if array.items.len() != items.len() {
                    return Err(Error::TypeMismatch {
                        expected: "tuple",
                        found: "array of another length",
                    });
                }
                for (item, &child) in array.items.iter().zip(items) {
                    self.write(program, child, item)?;
                }
                Ok(())
            }
            Node::Object(members) => self.write_record(program, members, value),
            Node::Array(element, props) => {
                let Value::Array(array) = value else {
                    return Err(mismatch(Kind::Array, value));
                };
                if self.back_reference(value)? {
                    return Ok(());
                }
                let array = array.borrow();
                self.put_positive(array.items.len() as u64)?;
                for item in &array.items {
                    self.write(program, *element, item)?;
                }
                self.write_props(program, props, &array.props)
            }
            Node::Set(element, props) => {
                let Value::Set(set) = value else {
                    return Err(mismatch(Kind::Set, value));
                };
                if self.back_reference(value)? {
                    return Ok(());
                }
                let set = set.borrow();
                self.put_positive(set.len() as u64)?;
                for item in set.items() {
                    self.write(program, *element, item)?;
                }
                self.write_props(program, props, &set.props)
            }
            Node::Map(key, val, props) => {
                let Value::Map(map) = value else {
                    return Err(mismatch(Kind::Map, value));
                };
                if self.back_reference(value)? {
                    return Ok(());
                }
                let map = map.borrow();
                self.put_positive(map.len() as u64)?;
                for (k, v) in map.entries() {
                    self.write(program, *key, k)?;
                    self.write(program, *val, v)?;
                }
                self.write_props(program, props, &map.props)
            }
            Node::Instance(name) => self.write_instance(name, value),
            Node::Recall(slot) => {
                let target = program.slot(*slot)?;
                self.write(program, target, value)
            }
        }
    }

    fn write_leaf(&mut self, kind: Kind, value: &Value) -> Result<()> {
        match (kind, value) {
            (Kind::Unknown | Kind::Any, _) => self.put_any(value),
            (Kind::Boolean, Value::Boolean(b)) => self.put_u8(u8::from(*b)),
            (Kind::Character, Value::String(s)) => match single_char(s) {
                Some(c) => self.put_char(c),
                None => Err(Error::TypeMismatch {
                    expected: kind.name(),
                    found: "string",
                }),
            },
            (Kind::Binary, Value::Binary(bytes)) => self.put_binary(bytes),
            (Kind::Integer, Value::Number(n)) => self.put_integer(*n),
            (Kind::PositiveInteger, Value::Number(n)) => self.put_positive_integer(*n),
            (Kind::BigInteger, Value::BigInt(b)) => self.put_big(b),
            (Kind::Number, Value::Number(n)) => self.put_f64(*n),
            (Kind::String, Value::String(s)) => self.put_string(s),
            (Kind::RegExp, Value::RegExp(r)) => self.put_regexp(r),
            (Kind::Date, Value::Date(ms)) => self.put_date(*ms),
            _ => Err(mismatch(kind, value)),
        }
    }

    /// Object or registered-class fields, by key, in schema order
    fn write_record(&mut self, program: &Program, members: &Members, value: &Value) -> Result<()> {
        if !matches!(value, Value::Object(_) | Value::Instance(_)) {
            return Err(mismatch(Kind::Object, value));
        }
        if self.back_reference(value)? {
            return Ok(());
        }
        for (key, child) in members {
            let field = value.get(key);
            self.write(program, *child, &field)?;
        }
        Ok(())
    }

    fn write_props(&mut self, program: &Program, props: &Members, object: &Object) -> Result<()> {
        for (key, child) in props {
            let prop = object.get(key).cloned().unwrap_or_default();
            self.write(program, *child, &prop)?;
        }
        Ok(())
    }

    fn write_instance(&mut self, name: &str, value: &Value) -> Result<()> {
        let Value::Instance(instance) = value else {
            return Err(mismatch(Kind::Instance, value));
        };
        let entry = self
            .registry
            .find_by_name(name)
            .ok_or_else(|| Error::UnknownClass(name.to_owned()))?;
        if !Arc::ptr_eq(entry.class(), instance.borrow().class()) {
            return Err(Error::TypeMismatch {
                expected: "instance",
                found: "instance of another class",
            });
        }
        let program = Arc::clone(entry.encoder().program());
        self.write(&program, Program::ROOT, value)
    }

    /// Write `REFERENCE idx` for a composite seen earlier in this call and
    /// return true, or write `START` and return false
    fn back_reference(&mut self, value: &Value) -> Result<bool> {
        match self.memory.remember_object(value) {
            Some(index) => {
                self.put_u8(REFERENCE)?;
                self.put_positive(index as u64)?;
                Ok(true)
            }
            None => {
                self.put_u8(START)?;
                Ok(false)
            }
        }
    }
}

#[inline]
fn fits_varint(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() < U64_LIMIT
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn mismatch(kind: Kind, value: &Value) -> Error {
    Error::TypeMismatch {
        expected: kind.name(),
        found: value.kind_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SliceSink;

    fn encoder() -> Encoder {
        Encoder::new(Registry::default(), &Config::default())
    }

    #[test]
    fn test_primitive_writers() {
        let mut enc = encoder();
        enc.put_u8(0x42).unwrap();
        enc.put_positive(300).unwrap();
        enc.put_integer(-1.0).unwrap();
        enc.put_f64(1.5).unwrap();
        let bytes = enc.finish();

        assert_eq!(&bytes[..4], &[0x42, 0xAC, 0x02, 0x41]);
        assert_eq!(&bytes[4..], &1.5f64.to_le_bytes());
    }

    #[test]
    fn test_negative_zero_keeps_sign() {
        let mut enc = encoder();
        enc.put_integer(0.0).unwrap();
        enc.put_integer(-0.0).unwrap();
        assert_eq!(enc.finish(), vec![0x00, 0x40]);
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let mut enc = encoder();
        assert!(matches!(enc.put_integer(1.5), Err(Error::TypeMismatch { .. })));
        assert!(matches!(enc.put_integer(f64::NAN), Err(Error::TypeMismatch { .. })));
        assert!(matches!(
            enc.put_positive_integer(-3.0),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_string_memory() {
        let mut enc = encoder();
        enc.put_string("hello").unwrap();
        enc.put_string("hello").unwrap();
        enc.put_string("a").unwrap();
        enc.put_string("a").unwrap();
        assert_eq!(
            enc.finish(),
            vec![b'h', b'e', b'l', b'l', b'o', 0x00, STRING_REFERENCE, 0x00, b'a', 0x00, b'a', 0x00]
        );
    }

    #[test]
    fn test_nul_in_string() {
        let mut enc = encoder();
        enc.put_string("a\0b").unwrap();
        assert_eq!(enc.finish(), vec![b'a', 0xC0, 0x80, b'b', 0x00]);
    }

    #[test]
    fn test_slice_sink_short_buffer() {
        let mut storage = [0u8; 3];
        let mut enc = Encoder::with_sink(
            SliceSink::new(&mut storage),
            Registry::default(),
            &Config::default(),
        );
        assert_eq!(enc.put_string("abcdef"), Err(Error::ShortBuffer));
    }

    #[test]
    fn test_any_writes_inline_schema() {
        let mut enc = encoder();
        enc.put_any(&Value::from(true)).unwrap();
        assert_eq!(enc.finish(), vec![Kind::Boolean.byte(), 0x01]);
    }
}
