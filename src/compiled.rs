//! Precompiled codec for one fixed schema
//!
//! Compiling up front saves the per-call schema work: the schema bytes are
//! copied verbatim in front of every payload, and the string memory they
//! leave behind is restored from a snapshot. The output is byte-identical to
//! a generic encode with the same schema.

use crate::buffer::{Cursor, GrowableBuffer};
use crate::codec::Codec;
use crate::config::Config;
use crate::decoder::Decoder;
use crate::dispatch::{compile_schema, Decoding, Dispatcher, Encoding};
use crate::encoder::Encoder;
use crate::error::Result;
use crate::memory::{Memory, Seed};
use crate::registry::Registry;
use crate::schema::Schema;
use crate::value::Value;

/// Codec bound to one schema
#[derive(Debug, Clone)]
pub struct CompiledCodec {
    schema: Schema,
    schema_bytes: Vec<u8>,
    encoder: Dispatcher<Encoding>,
    decoder: Dispatcher<Decoding>,
    seed: Seed,
    registry: Registry,
    config: Config,
}

impl CompiledCodec {
    /// Compile `schema` against `registry`
    pub fn new(schema: Schema, registry: Registry, config: Config) -> Result<Self> {
        let mut scratch = Encoder::new(registry.clone(), &config);
        let encoder = compile_schema(&schema, &mut scratch)?;
        let seed = scratch.memory().seed();
        let schema_bytes = scratch.finish();

        log::debug!(
            "[compiled] {} schema bytes for {}",
            schema_bytes.len(),
            schema
        );

        Ok(Self {
            decoder: encoder.to_decoder(),
            encoder,
            schema,
            schema_bytes,
            seed,
            registry,
            config,
        })
    }

    /// Schema this codec was compiled from
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Schema bytes written in front of every payload
    pub fn schema_bytes(&self) -> &[u8] {
        &self.schema_bytes
    }

    /// True if `bytes` starts with exactly this codec's schema bytes
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(&self.schema_bytes)
    }

    /// Schema bytes followed by `value`'s data bytes
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut enc = self.seeded_encoder();
        enc.put_bytes(&self.schema_bytes)?;
        self.encoder.encode(value, &mut enc)?;
        Ok(enc.finish())
    }

    /// Data bytes only, for callers that carry the schema out of band
    pub fn encode_naked(&self, value: &Value) -> Result<Vec<u8>> {
        let mut enc = self.seeded_encoder();
        self.encoder.encode(value, &mut enc)?;
        Ok(enc.finish())
    }

    /// Decode a full payload
    ///
    /// Input whose leading bytes are this codec's schema takes the fast path;
    /// anything else is decoded as a generic self-describing payload.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if !self.matches(bytes) {
            log::debug!("[compiled] schema mismatch, decoding generically");
            return Codec::with_parts(self.registry.clone(), self.config.clone()).decode(bytes);
        }

        let mut dec = self.seeded_decoder(bytes);
        dec.skip(self.schema_bytes.len())?;
        self.finish(dec)
    }

    /// Decode data bytes written by [`CompiledCodec::encode_naked`]
    pub fn decode_naked(&self, bytes: &[u8]) -> Result<Value> {
        let dec = self.seeded_decoder(bytes);
        self.finish(dec)
    }

    fn finish(&self, mut dec: Decoder<Cursor<'_>>) -> Result<Value> {
        let value = self.decoder.decode(&mut dec)?;
        if self.config.strict_trailing {
            dec.finish()?;
        }
        Ok(value)
    }

    fn seeded_encoder(&self) -> Encoder<GrowableBuffer> {
        Encoder::new(self.registry.clone(), &self.config).with_memory(Memory::from_seed(&self.seed))
    }

    fn seeded_decoder<'a>(&self, bytes: &'a [u8]) -> Decoder<Cursor<'a>> {
        Decoder::new(bytes, self.registry.clone(), &self.config)
            .with_memory(Memory::from_seed(&self.seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Schema {
        Schema::object([("name", Schema::String), ("age", Schema::Integer)])
    }

    fn codec() -> CompiledCodec {
        CompiledCodec::new(person(), Registry::new(), Config::default()).unwrap()
    }

    #[test]
    fn test_matches_generic_encoding() {
        let value = Value::object([("name", Value::from("name")), ("age", Value::from(30))]);
        let generic = Codec::new().encode(&value, Some(&person())).unwrap();
        let compiled = codec();
        assert_eq!(compiled.encode(&value).unwrap(), generic);
        assert!(compiled.matches(&generic));
        assert!(compiled.decode(&generic).unwrap().deep_eq(&value));
    }

    #[test]
    fn test_naked_round_trip() {
        let compiled = codec();
        let value = Value::object([("name", Value::from("Ada")), ("age", Value::from(36))]);
        let naked = compiled.encode_naked(&value).unwrap();
        assert_eq!(
            naked.len() + compiled.schema_bytes().len(),
            compiled.encode(&value).unwrap().len()
        );
        assert!(compiled.decode_naked(&naked).unwrap().deep_eq(&value));
    }

    #[test]
    fn test_falls_back_on_other_schema() {
        let compiled = codec();
        let other = Value::object([("name", Value::from("Ada")), ("admin", Value::from(true))]);
        let bytes = Codec::new().encode(&other, None).unwrap();
        assert!(!compiled.matches(&bytes));
        assert!(compiled.decode(&bytes).unwrap().deep_eq(&other));
    }
}
