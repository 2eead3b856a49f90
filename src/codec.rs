//! Codec context
//!
//! A [`Codec`] pairs a class registry with a [`Config`]. It is the entry point
//! for self-describing encoding: infer (or take) a schema, write its schema
//! bytes, then the data bytes, all through one encoder so that strings in
//! both sections share one memory.

use std::sync::Arc;

use crate::buffer::{SliceSink, Sink};
use crate::compiled::CompiledCodec;
use crate::config::Config;
use crate::decoder::Decoder;
use crate::dispatch::compile_schema;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::infer::Inference;
use crate::registry::{Class, Registry, RegistryEntry};
use crate::schema::Schema;
use crate::value::Value;

/// Registry plus configuration
#[derive(Debug, Clone, Default)]
pub struct Codec {
    registry: Registry,
    config: Config,
}

impl Codec {
    /// Codec with its own empty registry and default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec over the process-wide registry
    pub fn global() -> Self {
        Self::with_registry(Registry::global().clone())
    }

    /// Codec over `registry` with default configuration
    pub fn with_registry(registry: Registry) -> Self {
        Self::with_parts(registry, Config::default())
    }

    /// Codec from its parts
    pub fn with_parts(registry: Registry, config: Config) -> Self {
        Self { registry, config }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Class registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Infer the schema of `value`
    pub fn infer_schema(&self, value: &Value) -> Result<Schema> {
        Inference::new(Some(&self.registry))
            .with_max_depth(self.config.max_depth)
            .infer(value)
    }

    /// Schema bytes followed by data bytes
    ///
    /// Without an explicit schema the value's inferred schema is used.
    pub fn encode(&self, value: &Value, schema: Option<&Schema>) -> Result<Vec<u8>> {
        let mut enc = Encoder::new(self.registry.clone(), &self.config);
        self.encode_with(&mut enc, value, schema)?;
        Ok(enc.finish())
    }

    /// Like [`Codec::encode`], into a caller-provided buffer; returns the
    /// number of bytes written
    pub fn encode_into(&self, value: &Value, schema: Option<&Schema>, buf: &mut [u8]) -> Result<usize> {
        let mut enc = Encoder::with_sink(SliceSink::new(buf), self.registry.clone(), &self.config);
        self.encode_with(&mut enc, value, schema)?;
        Ok(enc.position())
    }

    /// Encode through an existing encoder (and so any [`Sink`])
    pub fn encode_with<S: Sink>(
        &self,
        enc: &mut Encoder<S>,
        value: &Value,
        schema: Option<&Schema>,
    ) -> Result<()> {
        let inferred;
        let schema = match schema {
            Some(schema) => schema,
            None => {
                inferred = self.infer_schema(value)?;
                &inferred
            }
        };
        let dispatcher = compile_schema(schema, enc)?;
        dispatcher.encode(value, enc)
    }

    /// Decode one self-describing value
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut dec = Decoder::new(bytes, self.registry.clone(), &self.config);
        let value = dec.get_any()?;
        if self.config.strict_trailing {
            dec.finish()?;
        }
        Ok(value)
    }

    /// Decode consecutive self-describing values until the input is used up
    ///
    /// Each value starts with fresh memory, as it was encoded.
    pub fn decode_many(&self, bytes: &[u8]) -> Result<Vec<Value>> {
        let mut dec = Decoder::new(bytes, self.registry.clone(), &self.config);
        let mut values = Vec::new();
        while !dec.is_at_end() {
            dec.reset_memory();
            values.push(dec.get_any()?);
        }
        Ok(values)
    }

    /// Read just the schema at the front of `bytes`
    pub fn read_schema(&self, bytes: &[u8]) -> Result<Schema> {
        let mut dec = Decoder::new(bytes, self.registry.clone(), &self.config);
        Ok(dec.schema()?.schema())
    }

    /// Precompile `schema`
    pub fn compile(&self, schema: Schema) -> Result<CompiledCodec> {
        CompiledCodec::new(schema, self.registry.clone(), self.config.clone())
    }

    /// Register `class` in this codec's registry
    pub fn register(
        &self,
        class: &Arc<Class>,
        schema: Schema,
        name: Option<&str>,
    ) -> Result<Arc<RegistryEntry>> {
        self.registry.register(class, schema, name)
    }
}
