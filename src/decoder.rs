//! Value decoder
//!
//! Mirrors [`Encoder`](crate::encoder::Encoder): bounds-checked primitive
//! readers over a [`Source`], and a node walker that rebuilds composites.
//! Every composite is allocated and entered into object memory before its
//! children are read, so a back-reference from inside the value (a cycle)
//! resolves to the very object being filled.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use num_bigint::{BigInt, Sign};

use crate::buffer::{Cursor, Source};
use crate::config::Config;
use crate::dispatch::{self, Decoding, Dispatcher, Members, Node, NodeId, Program};
use crate::error::{Error, Result};
use crate::memory::{is_memorable, Memory};
use crate::registry::{Class, Registry};
use crate::tag::{Kind, NULL, REFERENCE, START, STRING_REFERENCE, UNDEFINED};
use crate::value::{Array, Instance, Map, Object, RegExp, Set, Value};
use crate::varint;

/// Decoder reading from a [`Source`]
pub struct Decoder<R: Source> {
    source: R,
    memory: Memory,
    registry: Registry,
    max_depth: usize,
    depth: usize,
    scratch: Vec<u8>,
}

impl<'a> Decoder<Cursor<'a>> {
    /// Decoder over a byte slice
    pub fn new(bytes: &'a [u8], registry: Registry, config: &Config) -> Self {
        Self::with_source(Cursor::new(bytes), registry, config)
    }
}

impl<R: Source> Decoder<R> {
    /// Decoder over any source
    pub fn with_source(source: R, registry: Registry, config: &Config) -> Self {
        Self {
            source,
            memory: Memory::new(),
            registry,
            max_depth: config.max_depth,
            depth: 0,
            scratch: Vec::new(),
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

    /// Start a fresh value: forget all objects and strings
    pub fn reset_memory(&mut self) {
        self.memory.reset();
    }

    /// Get current position
    #[inline]
    pub fn position(&self) -> usize {
        self.source.position()
    }

    /// Get remaining bytes
    #[inline]
    pub fn remaining(&self) -> usize {
        self.source.remaining()
    }

    /// Check if all input was consumed
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.source.remaining() == 0
    }

    /// Fail with [`Error::TrailingBytes`] unless all input was consumed
    pub fn finish(&self) -> Result<()> {
        if self.is_at_end() {
            return Ok(());
        }
        Err(Error::TrailingBytes {
            position: self.position(),
            remaining: self.remaining(),
        })
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Skip bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.source.read_bytes(n).map(|_| ())
    }

    /// True if the next byte equals `byte`
    #[inline]
    pub fn peek_matches(&self, byte: u8) -> bool {
        self.source.peek_matches(byte)
    }

    /// Read a u8 value
    #[inline]
    pub fn get_u8(&mut self) -> Result<u8> {
        self.source.read_byte()
    }

    /// Read a varint-encoded u64
    #[inline]
    pub fn get_positive(&mut self) -> Result<u64> {
        let position = self.source.position();
        let source = &mut self.source;
        varint::read_u64(position, || source.read_byte())
    }

    /// Read a varint length or index
    pub fn get_length(&mut self) -> Result<usize> {
        let position = self.source.position();
        let value = self.get_positive()?;
        usize::try_from(value).map_err(|_| Error::InvalidVarint { position })
    }

    /// Read an element count; every element takes at least one byte
    pub(crate) fn get_count(&mut self) -> Result<usize> {
        let position = self.source.position();
        let count = self.get_length()?;
        let remaining = self.source.remaining();
        if count > remaining {
            return Err(Error::OutOfBounds {
                position,
                needed: count,
                len: self.source.position() + remaining,
            });
        }
        Ok(count)
    }

    /// Read a signed varint as (negative, magnitude)
    #[inline]
    pub fn get_signed(&mut self) -> Result<(bool, u64)> {
        let position = self.source.position();
        let source = &mut self.source;
        varint::read_signed(position, || source.read_byte())
    }

    /// Read an integral number; a negative zero comes back as `-0.0`
    pub fn get_integer(&mut self) -> Result<f64> {
        let (negative, magnitude) = self.get_signed()?;
        let value = magnitude as f64;
        Ok(if negative { -value } else { value })
    }

    /// Read a non-negative integral number
    pub fn get_positive_integer(&mut self) -> Result<f64> {
        Ok(self.get_positive()? as f64)
    }

    /// Read an arbitrary-precision integer
    pub fn get_big(&mut self) -> Result<BigInt> {
        let source = &mut self.source;
        let (negative, magnitude) = varint::read_big(|| source.read_byte())?;
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(BigInt::from_bytes_le(sign, &magnitude))
    }

    /// Read an f64 value (little-endian)
    pub fn get_f64(&mut self) -> Result<f64> {
        let bytes = self.source.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Read a string literal or string back-reference
    pub fn get_string(&mut self) -> Result<String> {
        let position = self.source.position();
        if self.source.peek_matches(STRING_REFERENCE) {
            self.source.read_byte()?;
            let index = self.get_positive()?;
            return usize::try_from(index)
                .ok()
                .and_then(|i| self.memory.string(i))
                .map(str::to_owned)
                .ok_or(Error::InvalidReference { index, position });
        }

        self.scratch.clear();
        self.source.read_terminated(&mut self.scratch)?;
        let text = decode_text(&self.scratch).ok_or(Error::InvalidUtf8 { position })?;
        if is_memorable(&text) {
            self.memory.push_string(text.clone());
        }
        Ok(text)
    }

    /// Read a single character written as its code point
    pub fn get_char(&mut self) -> Result<char> {
        let position = self.source.position();
        let code = self.get_positive()?;
        u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .ok_or(Error::InvalidUtf8 { position })
    }

    /// Read variable-length bytes with length prefix
    pub fn get_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.get_length()?;
        Ok(self.source.read_bytes(len)?.to_vec())
    }

    /// Read epoch milliseconds
    pub fn get_date(&mut self) -> Result<i64> {
        let position = self.source.position();
        let (negative, magnitude) = self.get_signed()?;
        if negative {
            if magnitude > i64::MAX as u64 + 1 {
                return Err(Error::InvalidVarint { position });
            }
            Ok((magnitude as i64).wrapping_neg())
        } else {
            i64::try_from(magnitude).map_err(|_| Error::InvalidVarint { position })
        }
    }

    /// Read a regular expression
    pub fn get_regexp(&mut self) -> Result<RegExp> {
        let source = self.get_string()?;
        let flags = self.get_string()?;
        Ok(RegExp { source, flags })
    }

    /// Read schema bytes
    pub fn schema(&mut self) -> Result<Dispatcher<Decoding>> {
        dispatch::read_schema(self)
    }

    /// Read an inline schema followed by one value
    pub fn get_any(&mut self) -> Result<Value> {
        let dispatcher = self.schema()?;
        dispatcher.decode(self)
    }

    /// Read one value through `node`; only composites count against the
    /// depth limit
    pub(crate) fn read(&mut self, program: &Program, node: NodeId) -> Result<Value> {
        if !program.node(node).is_composite() {
            return self.read_node(program, node);
        }
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimit(self.max_depth));
        }
        self.depth += 1;
        let result = self.read_node(program, node);
        self.depth -= 1;
        result
    }

    fn read_node(&mut self, program: &Program, node: NodeId) -> Result<Value> {
        match program.node(node) {
            Node::Leaf(kind) => self.read_leaf(*kind),
            Node::Nullable(inner) => {
                let position = self.source.position();
                match self.get_u8()? {
                    NULL => Ok(Value::Null),
                    UNDEFINED => Ok(Value::Undefined),
                    START => self.read(program, *inner),
                    byte => Err(Error::UnknownSchemaByte { byte, position }),
                }
            }
            Node::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for &child in items {
                    values.push(self.read(program, child)?);
                }
                Ok(Value::array(values))
            }
            Node::Object(members) => self.read_record(program, members, None),
            Node::Array(element, props) => {
                if let Some(seen) = self.open_composite()? {
                    return Ok(seen);
                }
                let shared = Rc::new(RefCell::new(Array::default()));
                self.memory.push_object(Value::Array(Rc::clone(&shared)));

                let len = self.get_count()?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read(program, *element)?);
                }
                shared.borrow_mut().items = items;

                let props = self.read_props(program, props)?;
                shared.borrow_mut().props = props;
                Ok(Value::Array(shared))
            }
            Node::Set(element, props) => {
                if let Some(seen) = self.open_composite()? {
                    return Ok(seen);
                }
                let shared = Rc::new(RefCell::new(Set::new()));
                self.memory.push_object(Value::Set(Rc::clone(&shared)));

                let len = self.get_count()?;
                for _ in 0..len {
                    let item = self.read(program, *element)?;
                    shared.borrow_mut().push(item);
                }

                let props = self.read_props(program, props)?;
                shared.borrow_mut().props = props;
                Ok(Value::Set(shared))
            }
            Node::Map(key, val, props) => {
                if let Some(seen) = self.open_composite()? {
                    return Ok(seen);
                }
                let shared = Rc::new(RefCell::new(Map::new()));
                self.memory.push_object(Value::Map(Rc::clone(&shared)));

                let len = self.get_count()?;
                for _ in 0..len {
                    let k = self.read(program, *key)?;
                    let v = self.read(program, *val)?;
                    shared.borrow_mut().push(k, v);
                }

                let props = self.read_props(program, props)?;
                shared.borrow_mut().props = props;
                Ok(Value::Map(shared))
            }
            Node::Instance(name) => {
                let entry = self
                    .registry
                    .find_by_name(name)
                    .ok_or_else(|| Error::UnknownClass(name.clone()))?;
                let program = Arc::clone(entry.decoder().program());
                match program.node(Program::ROOT) {
                    Node::Object(members) => {
                        self.read_record(&program, members, Some(entry.class()))
                    }
                    _ => Err(Error::UnsupportedSchema("registered schema is not an object")),
                }
            }
            Node::Recall(slot) => {
                let target = program.slot(*slot)?;
                self.read(program, target)
            }
        }
    }

    fn read_leaf(&mut self, kind: Kind) -> Result<Value> {
        let value = match kind {
            Kind::Boolean => {
                let position = self.source.position();
                match self.get_u8()? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    byte => return Err(Error::UnknownSchemaByte { byte, position }),
                }
            }
            Kind::Character => Value::String(self.get_char()?.to_string()),
            Kind::Binary => Value::Binary(self.get_binary()?),
            Kind::Integer => Value::Number(self.get_integer()?),
            Kind::PositiveInteger => Value::Number(self.get_positive_integer()?),
            Kind::BigInteger => Value::BigInt(self.get_big()?),
            Kind::Number => Value::Number(self.get_f64()?),
            Kind::String => Value::String(self.get_string()?),
            Kind::RegExp => Value::RegExp(self.get_regexp()?),
            Kind::Date => Value::Date(self.get_date()?),
            _ => self.get_any()?,
        };
        Ok(value)
    }

    /// Object or registered-class instance
    fn read_record(
        &mut self,
        program: &Program,
        members: &Members,
        class: Option<&Arc<Class>>,
    ) -> Result<Value> {
        if let Some(seen) = self.open_composite()? {
            return Ok(seen);
        }

        let fields = Object::with_capacity(members.len());
        let value = match class {
            Some(class) => Value::Instance(Rc::new(RefCell::new(Instance::new(class, fields)))),
            None => Value::Object(Rc::new(RefCell::new(fields))),
        };
        self.memory.push_object(value.clone());

        for (key, child) in members {
            let field = self.read(program, *child)?;
            if matches!(field, Value::Undefined) {
                continue;
            }
            match &value {
                Value::Instance(instance) => instance.borrow_mut().fields.insert(key.clone(), field),
                Value::Object(object) => object.borrow_mut().insert(key.clone(), field),
                _ => {}
            }
        }
        Ok(value)
    }

    fn read_props(&mut self, program: &Program, props: &Members) -> Result<Object> {
        let mut object = Object::with_capacity(props.len());
        for (key, child) in props {
            let prop = self.read(program, *child)?;
            if !matches!(prop, Value::Undefined) {
                object.insert(key.clone(), prop);
            }
        }
        Ok(object)
    }

    /// Resolve `REFERENCE idx` to the remembered composite, or consume
    /// `START` and return `None`
    fn open_composite(&mut self) -> Result<Option<Value>> {
        let position = self.source.position();
        match self.get_u8()? {
            START => Ok(None),
            REFERENCE => {
                let index = self.get_positive()?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.memory.object(i))
                    .cloned()
                    .map(Some)
                    .ok_or(Error::InvalidReference { index, position })
            }
            byte => Err(Error::UnknownSchemaByte { byte, position }),
        }
    }
}

/// UTF-8 with `C0 80` standing in for NUL
fn decode_text(bytes: &[u8]) -> Option<String> {
    if !bytes.contains(&0xC0) {
        return std::str::from_utf8(bytes).ok().map(str::to_owned);
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(byte) = iter.next() {
        if byte != 0xC0 {
            out.push(byte);
        } else if iter.next()? == 0x80 {
            out.push(0);
        } else {
            return None;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;

    fn decoder(bytes: &[u8]) -> Decoder<Cursor<'_>> {
        Decoder::new(bytes, Registry::default(), &Config::default())
    }

    #[test]
    fn test_primitive_readers() {
        let mut enc = Encoder::new(Registry::default(), &Config::default());
        enc.put_positive(300).unwrap();
        enc.put_integer(-1.0).unwrap();
        enc.put_f64(2.25).unwrap();
        enc.put_date(-86_400_000).unwrap();
        enc.put_char('é').unwrap();
        enc.put_binary(&[9, 8, 7]).unwrap();
        let bytes = enc.finish();

        let mut dec = decoder(&bytes);
        assert_eq!(dec.get_positive().unwrap(), 300);
        assert_eq!(dec.get_integer().unwrap(), -1.0);
        assert_eq!(dec.get_f64().unwrap(), 2.25);
        assert_eq!(dec.get_date().unwrap(), -86_400_000);
        assert_eq!(dec.get_char().unwrap(), 'é');
        assert_eq!(dec.get_binary().unwrap(), vec![9, 8, 7]);
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_big_integers() {
        let huge: BigInt = BigInt::from(1u8) << 70;
        let mut enc = Encoder::new(Registry::default(), &Config::default());
        enc.put_big(&BigInt::from(-1)).unwrap();
        enc.put_big(&BigInt::from(0)).unwrap();
        enc.put_big(&-huge.clone()).unwrap();
        let bytes = enc.finish();
        assert_eq!(&bytes[..2], &[0x41, 0x00]);

        let mut dec = decoder(&bytes);
        assert_eq!(dec.get_big().unwrap(), BigInt::from(-1));
        assert_eq!(dec.get_big().unwrap(), BigInt::from(0));
        assert_eq!(dec.get_big().unwrap(), -huge);
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_negative_zero() {
        let mut dec = decoder(&[0x40]);
        let value = dec.get_integer().unwrap();
        assert_eq!(value, 0.0);
        assert!(value.is_sign_negative());
    }

    #[test]
    fn test_string_memory_and_nul() {
        let bytes = [
            b'a', 0xC0, 0x80, b'b', 0x00, STRING_REFERENCE, 0x00, b'x', 0x00,
        ];
        let mut dec = decoder(&bytes);
        assert_eq!(dec.get_string().unwrap(), "a\0b");
        assert_eq!(dec.get_string().unwrap(), "a\0b");
        assert_eq!(dec.get_string().unwrap(), "x");
        assert_eq!(dec.memory().string_count(), 1);
    }

    #[test]
    fn test_bad_string_reference() {
        let mut dec = decoder(&[STRING_REFERENCE, 0x05]);
        assert_eq!(
            dec.get_string(),
            Err(Error::InvalidReference {
                index: 5,
                position: 0
            })
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut dec = decoder(&[0xC0, 0x41, 0x00]);
        assert_eq!(dec.get_string(), Err(Error::InvalidUtf8 { position: 0 }));
    }

    #[test]
    fn test_truncated_input() {
        let mut dec = decoder(&[0x01, 0x02]);
        assert_eq!(
            dec.get_f64(),
            Err(Error::OutOfBounds {
                position: 0,
                needed: 8,
                len: 2
            })
        );
    }

    #[test]
    fn test_count_larger_than_input() {
        let mut dec = decoder(&[0x7F]);
        assert!(matches!(dec.get_count(), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_trailing_bytes() {
        let bytes = [Kind::Boolean.byte(), 0x01, 0xAA];
        let mut dec = decoder(&bytes);
        assert_eq!(dec.get_any().unwrap().as_bool(), Some(true));
        assert_eq!(
            dec.finish(),
            Err(Error::TrailingBytes {
                position: 2,
                remaining: 1
            })
        );
    }
}
