//! Compiled dispatchers
//!
//! A schema is compiled once into a flat arena of [`Node`]s, written out as
//! schema bytes on the way. Every composite node that owns a recall slot is
//! reserved in the arena before its children are compiled, so a `Recall`
//! anywhere below (or beside) it resolves to a plain index. The same arena
//! drives encoding and decoding; [`Dispatcher`] only tags which direction a
//! handle is meant for.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::buffer::{Sink, Source};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::schema::{Fields, Schema};
use crate::tag::{Kind, STOP};
use crate::value::Value;

pub(crate) type NodeId = usize;

/// Keyed members of an object node, or side properties of a collection
pub(crate) type Members = Vec<(String, NodeId)>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Unknown, Any and the primitives
    Leaf(Kind),
    Nullable(NodeId),
    Tuple(Vec<NodeId>),
    Object(Members),
    Array(NodeId, Members),
    Set(NodeId, Members),
    Map(NodeId, NodeId, Members),
    Instance(String),
    Recall(usize),
}

impl Node {
    /// Nodes that open a nesting level at runtime
    #[inline]
    pub(crate) fn is_composite(&self) -> bool {
        matches!(
            self,
            Node::Tuple(_) | Node::Object(_) | Node::Array(..) | Node::Set(..) | Node::Map(..)
        )
    }
}

/// Node arena for one compiled schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    nodes: Vec<Node>,
    slots: Vec<NodeId>,
}

impl Program {
    pub(crate) const ROOT: NodeId = 0;

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Node owning recall slot `slot`
    #[inline]
    pub(crate) fn slot(&self, slot: usize) -> Result<NodeId> {
        self.slots
            .get(slot)
            .copied()
            .ok_or_else(|| unknown_slot(slot, self.slots.len()))
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True for an empty arena
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of recall slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Kind of the root node
    pub fn kind(&self) -> Kind {
        match self.nodes.first() {
            Some(node) => node_kind(node),
            None => Kind::Unknown,
        }
    }

    /// Rebuild the schema this arena was compiled from
    pub fn to_schema(&self) -> Schema {
        if self.nodes.is_empty() {
            return Schema::Unknown;
        }
        self.schema_at(Self::ROOT)
    }

    fn schema_at(&self, id: NodeId) -> Schema {
        match self.node(id) {
            Node::Leaf(kind) => leaf_schema(*kind),
            Node::Nullable(inner) => Schema::Nullable(Box::new(self.schema_at(*inner))),
            Node::Tuple(items) => Schema::Tuple(items.iter().map(|&i| self.schema_at(i)).collect()),
            Node::Object(members) => Schema::Object(self.fields_at(members)),
            Node::Array(element, props) => {
                Schema::Array(Box::new(self.schema_at(*element)), self.fields_at(props))
            }
            Node::Set(element, props) => {
                Schema::Set(Box::new(self.schema_at(*element)), self.fields_at(props))
            }
            Node::Map(key, value, props) => Schema::Map(
                Box::new(self.schema_at(*key)),
                Box::new(self.schema_at(*value)),
                self.fields_at(props),
            ),
            Node::Instance(name) => Schema::Instance(name.clone()),
            Node::Recall(slot) => Schema::Recall(*slot),
        }
    }

    fn fields_at(&self, members: &Members) -> Fields {
        members
            .iter()
            .map(|(key, id)| (key.clone(), self.schema_at(*id)))
            .collect()
    }
}

fn node_kind(node: &Node) -> Kind {
    match node {
        Node::Leaf(kind) => *kind,
        Node::Nullable(_) => Kind::Nullable,
        Node::Tuple(_) => Kind::Tuple,
        Node::Object(_) => Kind::Object,
        Node::Array(..) => Kind::Array,
        Node::Set(..) => Kind::Set,
        Node::Map(..) => Kind::Map,
        Node::Instance(_) => Kind::Instance,
        Node::Recall(_) => Kind::Recall,
    }
}

fn leaf_schema(kind: Kind) -> Schema {
    match kind {
        Kind::Any => Schema::Any,
        Kind::Boolean => Schema::Boolean,
        Kind::Character => Schema::Character,
        Kind::Binary => Schema::Binary,
        Kind::Integer => Schema::Integer,
        Kind::PositiveInteger => Schema::PositiveInteger,
        Kind::BigInteger => Schema::BigInteger,
        Kind::Number => Schema::Number,
        Kind::String => Schema::String,
        Kind::RegExp => Schema::RegExp,
        Kind::Date => Schema::Date,
        _ => Schema::Unknown,
    }
}

fn unknown_slot(slot: usize, count: usize) -> Error {
    Error::UnknownDispatcher(format!("recall #{} with {} slots", slot, count))
}

/// Encoding direction marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding;

/// Decoding direction marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoding;

/// Handle to a compiled schema, tagged with the direction it serves
#[derive(Debug, Clone)]
pub struct Dispatcher<R> {
    program: Arc<Program>,
    role: PhantomData<R>,
}

impl<R> Dispatcher<R> {
    fn from_program(program: Arc<Program>) -> Self {
        Self {
            program,
            role: PhantomData,
        }
    }

    /// Kind of the root node
    pub fn kind(&self) -> Kind {
        self.program.kind()
    }

    /// Schema this dispatcher was compiled from
    pub fn schema(&self) -> Schema {
        self.program.to_schema()
    }

    /// Underlying node arena
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }
}

impl Dispatcher<Encoding> {
    /// Decoding handle over the same arena
    pub fn to_decoder(&self) -> Dispatcher<Decoding> {
        Dispatcher::from_program(Arc::clone(&self.program))
    }

    /// Write `value`'s data bytes
    pub fn encode<S: Sink>(&self, value: &Value, encoder: &mut Encoder<S>) -> Result<()> {
        encoder.write(&self.program, Program::ROOT, value)
    }
}

impl Dispatcher<Decoding> {
    /// Read one value's data bytes
    pub fn decode<R: Source>(&self, decoder: &mut Decoder<R>) -> Result<Value> {
        decoder.read(&self.program, Program::ROOT)
    }
}

#[derive(Default)]
struct Builder {
    nodes: Vec<Node>,
    slots: Vec<NodeId>,
    depth: usize,
}

impl Builder {
    fn reserve(&mut self, kind: Kind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf(Kind::Unknown));
        if kind.is_slotted() {
            self.slots.push(id);
        }
        id
    }

    fn descend(&mut self, max_depth: usize) -> Result<()> {
        if self.depth >= max_depth {
            return Err(Error::DepthLimit(max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn finish(self) -> Result<Program> {
        let count = self.slots.len();
        for node in &self.nodes {
            if let Node::Recall(slot) = node {
                if *slot >= count {
                    return Err(unknown_slot(*slot, count));
                }
            }
        }
        Ok(Program {
            nodes: self.nodes,
            slots: self.slots,
        })
    }
}

/// Compile `schema`, writing its schema bytes through `encoder`
///
/// Member keys and instance names go through the encoder's string memory, so
/// data written afterwards by the same encoder shares them.
pub fn compile_schema<S: Sink>(
    schema: &Schema,
    encoder: &mut Encoder<S>,
) -> Result<Dispatcher<Encoding>> {
    let mut builder = Builder::default();
    compile_node(&mut builder, schema, encoder)?;
    let program = builder.finish()?;
    log::trace!(
        "[dispatch] compiled {} nodes, {} slots",
        program.len(),
        program.slot_count()
    );
    Ok(Dispatcher::from_program(Arc::new(program)))
}

fn compile_node<S: Sink>(b: &mut Builder, schema: &Schema, enc: &mut Encoder<S>) -> Result<NodeId> {
    b.descend(enc.max_depth())?;
    let kind = schema.kind();
    let id = b.reserve(kind);
    enc.put_u8(kind.byte())?;

    let node = match schema {
        Schema::Nullable(inner) => Node::Nullable(compile_node(b, inner, enc)?),
        Schema::Tuple(items) => {
            enc.put_positive(items.len() as u64)?;
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                ids.push(compile_node(b, item, enc)?);
            }
            Node::Tuple(ids)
        }
        Schema::Object(fields) => Node::Object(compile_members(b, fields, enc)?),
        Schema::Array(element, props) => {
            let element = compile_node(b, element, enc)?;
            Node::Array(element, compile_members(b, props, enc)?)
        }
        Schema::Set(element, props) => {
            let element = compile_node(b, element, enc)?;
            Node::Set(element, compile_members(b, props, enc)?)
        }
        Schema::Map(key, value, props) => {
            let key = compile_node(b, key, enc)?;
            let value = compile_node(b, value, enc)?;
            Node::Map(key, value, compile_members(b, props, enc)?)
        }
        Schema::Instance(name) => {
            enc.put_string(name)?;
            Node::Instance(name.clone())
        }
        Schema::Recall(slot) => {
            enc.put_positive(*slot as u64)?;
            Node::Recall(*slot)
        }
        leaf => Node::Leaf(leaf.kind()),
    };

    b.nodes[id] = node;
    b.depth -= 1;
    Ok(id)
}

fn compile_members<S: Sink>(b: &mut Builder, fields: &Fields, enc: &mut Encoder<S>) -> Result<Members> {
    let mut members = Vec::with_capacity(fields.len());
    for (key, schema) in fields {
        enc.put_string(key)?;
        members.push((key.clone(), compile_node(b, schema, enc)?));
    }
    enc.put_u8(STOP)?;
    Ok(members)
}

/// Read schema bytes and build the matching dispatcher
pub fn read_schema<R: Source>(decoder: &mut Decoder<R>) -> Result<Dispatcher<Decoding>> {
    let mut builder = Builder::default();
    read_node(&mut builder, decoder)?;
    Ok(Dispatcher::from_program(Arc::new(builder.finish()?)))
}

fn read_node<R: Source>(b: &mut Builder, dec: &mut Decoder<R>) -> Result<NodeId> {
    b.descend(dec.max_depth())?;
    let position = dec.position();
    let byte = dec.get_u8()?;
    let kind = Kind::from_byte(byte).ok_or(Error::UnknownSchemaByte { byte, position })?;
    let id = b.reserve(kind);

    let node = match kind {
        Kind::Nullable => Node::Nullable(read_node(b, dec)?),
        Kind::Tuple => {
            // every member takes at least one schema byte
            let arity = dec.get_count()?;
            let mut ids = Vec::with_capacity(arity);
            for _ in 0..arity {
                ids.push(read_node(b, dec)?);
            }
            Node::Tuple(ids)
        }
        Kind::Object => Node::Object(read_members(b, dec)?),
        Kind::Array => {
            let element = read_node(b, dec)?;
            Node::Array(element, read_members(b, dec)?)
        }
        Kind::Set => {
            let element = read_node(b, dec)?;
            Node::Set(element, read_members(b, dec)?)
        }
        Kind::Map => {
            let key = read_node(b, dec)?;
            let value = read_node(b, dec)?;
            Node::Map(key, value, read_members(b, dec)?)
        }
        Kind::Instance => Node::Instance(dec.get_string()?),
        Kind::Recall => Node::Recall(dec.get_length()?),
        leaf => Node::Leaf(leaf),
    };

    b.nodes[id] = node;
    b.depth -= 1;
    Ok(id)
}

fn read_members<R: Source>(b: &mut Builder, dec: &mut Decoder<R>) -> Result<Members> {
    let mut members = Vec::new();
    while !dec.peek_matches(STOP) {
        let key = dec.get_string()?;
        members.push((key, read_node(b, dec)?));
    }
    dec.get_u8()?;
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::Registry;

    fn compile(schema: &Schema) -> (Dispatcher<Encoding>, Vec<u8>) {
        let mut enc = Encoder::new(Registry::default(), &Config::default());
        let dispatcher = compile_schema(schema, &mut enc).unwrap();
        (dispatcher, enc.finish())
    }

    fn parse(bytes: &[u8]) -> Result<Dispatcher<Decoding>> {
        let mut dec = Decoder::new(bytes, Registry::default(), &Config::default());
        read_schema(&mut dec)
    }

    #[test]
    fn test_leaf_schema_bytes() {
        let (_, bytes) = compile(&Schema::Integer);
        assert_eq!(bytes, vec![Kind::Integer.byte()]);

        let (_, bytes) = compile(&Schema::nullable(Schema::String));
        assert_eq!(bytes, vec![Kind::Nullable.byte(), Kind::String.byte()]);
    }

    #[test]
    fn test_object_schema_bytes() {
        let (_, bytes) = compile(&Schema::object([("id", Schema::Integer)]));
        assert_eq!(
            bytes,
            vec![Kind::Object.byte(), b'i', b'd', 0x00, Kind::Integer.byte(), STOP]
        );
    }

    #[test]
    fn test_repeated_keys_use_string_memory() {
        let schema = Schema::object([
            ("name", Schema::String),
            ("child", Schema::object([("name", Schema::String)])),
        ]);
        let (_, bytes) = compile(&schema);
        // second "name" is STRING_REFERENCE + index 0
        assert!(bytes.windows(2).any(|w| w == [crate::tag::STRING_REFERENCE, 0]));
        assert_eq!(parse(&bytes).unwrap().schema(), schema);
    }

    #[test]
    fn test_recall_resolves_to_preorder_slot() {
        let schema = Schema::object([
            ("tags", Schema::array(Schema::String)),
            ("next", Schema::nullable(Schema::Recall(0))),
            ("list", Schema::Recall(1)),
        ]);
        let (dispatcher, bytes) = compile(&schema);
        let program = dispatcher.program();
        assert_eq!(program.slot_count(), 2);
        assert_eq!(program.slot(0).unwrap(), Program::ROOT);
        assert!(matches!(program.node(program.slot(1).unwrap()), Node::Array(..)));

        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.program().as_ref(), program.as_ref());
        assert_eq!(parsed.schema(), schema);
    }

    #[test]
    fn test_dangling_recall_is_rejected() {
        let schema = Schema::object([("next", Schema::Recall(3))]);
        let mut enc = Encoder::new(Registry::default(), &Config::default());
        assert!(matches!(
            compile_schema(&schema, &mut enc),
            Err(Error::UnknownDispatcher(_))
        ));

        let bytes = [Kind::Array.byte(), Kind::Recall.byte(), 1, STOP];
        assert!(matches!(parse(&bytes), Err(Error::UnknownDispatcher(_))));
    }

    #[test]
    fn test_unknown_schema_byte() {
        assert_eq!(
            parse(&[0x42]).unwrap_err(),
            Error::UnknownSchemaByte {
                byte: 0x42,
                position: 0
            }
        );
        assert!(matches!(
            parse(&[Kind::Object.byte(), b'a', 0x00]),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_tuple_and_map_round_trip() {
        let schema = Schema::tuple([
            Schema::map(Schema::String, Schema::set(Schema::Date)),
            Schema::instance("Point"),
            Schema::Any,
            Schema::Unknown,
        ]);
        let (encoder, bytes) = compile(&schema);
        assert_eq!(encoder.kind(), Kind::Tuple);
        assert_eq!(encoder.to_decoder().schema(), schema);
        assert_eq!(parse(&bytes).unwrap().schema(), schema);
    }

    #[test]
    fn test_schema_depth_limit() {
        let mut schema = Schema::Integer;
        for _ in 0..10 {
            schema = Schema::array(schema);
        }
        let config = Config::default().with_max_depth(5);
        let mut enc = Encoder::new(Registry::default(), &config);
        assert_eq!(
            compile_schema(&schema, &mut enc).unwrap_err(),
            Error::DepthLimit(5)
        );
    }
}
