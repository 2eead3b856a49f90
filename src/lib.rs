//! SchemaBit: self-describing binary serialization for dynamic values
//!
//! Every payload carries its own schema. The encoder infers the shape of a
//! value (or takes one from the caller), writes it as compact schema bytes,
//! then writes the data bytes that schema dictates. Repeated strings and
//! repeated (or cyclic) object references are deduplicated within a payload,
//! so shared structure and cycles survive a round trip.
//!
//! # Payload Format
//!
//! ```text
//! +------------------------------+------------------------------------+
//! | Schema bytes (pre-order)     | Data bytes                         |
//! +------------------------------+------------------------------------+
//! | kind tag u8                  | primitives: varint / f64 LE / utf8 |
//! | members: key string, child   | composites: START payload          |
//! | ... STOP                     |          or REFERENCE varint       |
//! | Recall: slot varint          | nullable: NULL | UNDEFINED | START |
//! +------------------------------+------------------------------------+
//! ```
//!
//! # Features
//!
//! - Schema inference with joins over heterogeneous collections
//! - Recursive schemas through pre-order recall slots
//! - Object identity and string dedup within a payload
//! - Precompiled codecs for fixed schemas, byte-identical to generic output
//! - Registered classes that decode back into instances
//! - Pluggable output sinks and input sources
//!
//! # Example
//!
//! ```rust
//! use schemabit::{Codec, Schema, Value};
//!
//! let codec = Codec::new();
//! let order = Value::object([
//!     ("id", Value::from(12345)),
//!     ("symbol", Value::from("AAPL")),
//!     ("price", Value::from(50.25)),
//! ]);
//!
//! assert_eq!(
//!     codec.infer_schema(&order)?,
//!     Schema::object([
//!         ("id", Schema::Integer),
//!         ("symbol", Schema::String),
//!         ("price", Schema::Number),
//!     ])
//! );
//!
//! let bytes = codec.encode(&order, None)?;
//! let decoded = codec.decode(&bytes)?;
//! assert!(decoded.deep_eq(&order));
//! # Ok::<(), schemabit::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod codec;
pub mod compiled;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod infer;
#[cfg(feature = "json")]
pub mod json;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod tag;
pub mod value;
pub mod varint;

#[cfg(test)]
pub mod bench;

use std::sync::Arc;

// Re-export main types
pub use num_bigint::BigInt;
pub use buffer::{Cursor, GrowableBuffer, Sink, SliceSink, Source};
pub use codec::Codec;
pub use compiled::CompiledCodec;
pub use config::Config;
pub use decoder::Decoder;
pub use dispatch::{compile_schema, read_schema, Decoding, Dispatcher, Encoding, Program};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use infer::{join, Inference};
pub use memory::Memory;
pub use registry::{Class, Registry, RegistryEntry};
pub use schema::{Fields, Schema};
pub use tag::Kind;
pub use value::{Array, Instance, Map, Object, RegExp, Set, Value};

/// Starting capacity of a fresh output buffer
pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Capacity an output buffer jumps to on first overflow
pub const DEFAULT_BASE_CAPACITY: usize = 4096;

/// Default nesting limit for inference, encoding and decoding
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Infer the schema of `value` against the global registry
pub fn infer_schema(value: &Value) -> Result<Schema> {
    Codec::global().infer_schema(value)
}

/// Encode `value` self-describingly, with its inferred schema or `schema`
pub fn encode(value: &Value, schema: Option<&Schema>) -> Result<Vec<u8>> {
    Codec::global().encode(value, schema)
}

/// Decode one self-describing value
pub fn decode(bytes: &[u8]) -> Result<Value> {
    Codec::global().decode(bytes)
}

/// Decode back-to-back self-describing values
pub fn decode_many(bytes: &[u8]) -> Result<Vec<Value>> {
    Codec::global().decode_many(bytes)
}

/// Read the schema at the front of a payload
pub fn read_schema_bytes(bytes: &[u8]) -> Result<Schema> {
    Codec::global().read_schema(bytes)
}

/// Precompile a codec for `schema`
pub fn compile(schema: Schema) -> Result<CompiledCodec> {
    Codec::global().compile(schema)
}

/// Register `class` in the global registry
pub fn register(class: &Arc<Class>, schema: Schema, name: Option<&str>) -> Result<Arc<RegistryEntry>> {
    Codec::global().register(class, schema, name)
}
