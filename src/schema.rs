//! Schema model
//!
//! A [`Schema`] describes the shape of a value: which primitive it is, or
//! which composite constructor and member schemas. Schemas are plain data;
//! [`Schema::Recall`] is the only node that refers to another node, by its
//! pre-order slot among the composite (object, array, set, map) nodes. That
//! makes recursive shapes such as linked lists expressible without shared
//! ownership:
//!
//! ```rust
//! use schemabit::Schema;
//!
//! // slot 0 is the outer object; `next` refers back to it
//! let list = Schema::object([
//!     ("value", Schema::Integer),
//!     ("next", Schema::nullable(Schema::Recall(0))),
//! ]);
//! assert_eq!(list.to_string(), "{value: integer, next: #0?}");
//! ```

use std::fmt;

use crate::tag::Kind;

/// Ordered member list of an object (or the side properties of a collection)
pub type Fields = Vec<(String, Schema)>;

/// Shape of a value
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Nothing observed yet; joins away
    Unknown,
    /// Dynamic; the schema is written next to every value
    Any,
    /// Boolean
    Boolean,
    /// Single-character string
    Character,
    /// Byte buffer
    Binary,
    /// Integral number
    Integer,
    /// Non-negative integral number
    PositiveInteger,
    /// Arbitrary-precision integer
    BigInteger,
    /// Double-precision number
    Number,
    /// String
    String,
    /// Regular expression
    RegExp,
    /// Date
    Date,
    /// Inner schema, or null/undefined
    Nullable(Box<Schema>),
    /// Fixed-arity positional sequence
    Tuple(Vec<Schema>),
    /// Record with fixed keys
    Object(Fields),
    /// Array of `element` with side properties
    Array(Box<Schema>, Fields),
    /// Set of `element` with side properties
    Set(Box<Schema>, Fields),
    /// Map from `key` to `value` with side properties
    Map(Box<Schema>, Box<Schema>, Fields),
    /// Instance of the class registered under this name
    Instance(String),
    /// The composite node in this pre-order slot
    Recall(usize),
}

impl Schema {
    /// `inner` or null/undefined
    ///
    /// Nullable is idempotent and `Any` already admits null, so neither is
    /// wrapped again.
    pub fn nullable(inner: Schema) -> Schema {
        match inner {
            Schema::Nullable(_) | Schema::Any => inner,
            other => Schema::Nullable(Box::new(other)),
        }
    }

    /// Record with the given members, in order
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Schema {
        Schema::Object(collect_fields(fields))
    }

    /// Array without side properties
    pub fn array(element: Schema) -> Schema {
        Schema::Array(Box::new(element), Fields::new())
    }

    /// Array with side properties
    pub fn array_with<K: Into<String>>(
        element: Schema,
        props: impl IntoIterator<Item = (K, Schema)>,
    ) -> Schema {
        Schema::Array(Box::new(element), collect_fields(props))
    }

    /// Set without side properties
    pub fn set(element: Schema) -> Schema {
        Schema::Set(Box::new(element), Fields::new())
    }

    /// Map without side properties
    pub fn map(key: Schema, value: Schema) -> Schema {
        Schema::Map(Box::new(key), Box::new(value), Fields::new())
    }

    /// Tuple of the given element schemas
    pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Schema {
        Schema::Tuple(items.into_iter().collect())
    }

    /// Registered class instance
    pub fn instance(name: impl Into<String>) -> Schema {
        Schema::Instance(name.into())
    }

    /// Wire kind of this node
    pub fn kind(&self) -> Kind {
        match self {
            Schema::Unknown => Kind::Unknown,
            Schema::Any => Kind::Any,
            Schema::Boolean => Kind::Boolean,
            Schema::Character => Kind::Character,
            Schema::Binary => Kind::Binary,
            Schema::Integer => Kind::Integer,
            Schema::PositiveInteger => Kind::PositiveInteger,
            Schema::BigInteger => Kind::BigInteger,
            Schema::Number => Kind::Number,
            Schema::String => Kind::String,
            Schema::RegExp => Kind::RegExp,
            Schema::Date => Kind::Date,
            Schema::Nullable(_) => Kind::Nullable,
            Schema::Tuple(_) => Kind::Tuple,
            Schema::Object(_) => Kind::Object,
            Schema::Array(..) => Kind::Array,
            Schema::Set(..) => Kind::Set,
            Schema::Map(..) => Kind::Map,
            Schema::Instance(_) => Kind::Instance,
            Schema::Recall(_) => Kind::Recall,
        }
    }

    /// Primitive leaf (boolean through date)
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Schema::Boolean
                | Schema::Character
                | Schema::Binary
                | Schema::Integer
                | Schema::PositiveInteger
                | Schema::BigInteger
                | Schema::Number
                | Schema::String
                | Schema::RegExp
                | Schema::Date
        )
    }

    /// Composite constructor (tuple, object, array, set, map)
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Schema::Tuple(_) | Schema::Object(_) | Schema::Array(..) | Schema::Set(..) | Schema::Map(..)
        )
    }

    /// Node that owns a recall slot
    pub fn is_slotted(&self) -> bool {
        self.kind().is_slotted()
    }

    /// Nullable wrapper
    pub fn is_nullable(&self) -> bool {
        matches!(self, Schema::Nullable(_))
    }

    /// Composite nodes in pre-order, i.e. indexed by recall slot
    pub fn slots(&self) -> Vec<&Schema> {
        let mut out = Vec::new();
        self.collect_slots(&mut out);
        out
    }

    fn collect_slots<'a>(&'a self, out: &mut Vec<&'a Schema>) {
        if self.is_slotted() {
            out.push(self);
        }
        for child in self.children() {
            child.collect_slots(out);
        }
    }

    /// Direct child schemas, in wire order
    pub fn children(&self) -> Vec<&Schema> {
        match self {
            Schema::Nullable(inner) => vec![&**inner],
            Schema::Tuple(items) => items.iter().collect(),
            Schema::Object(fields) => fields.iter().map(|(_, s)| s).collect(),
            Schema::Array(element, props) | Schema::Set(element, props) => {
                std::iter::once(&**element).chain(props.iter().map(|(_, s)| s)).collect()
            }
            Schema::Map(key, value, props) => [&**key, &**value]
                .into_iter()
                .chain(props.iter().map(|(_, s)| s))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn collect_fields<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Fields {
    fields.into_iter().map(|(k, s)| (k.into(), s)).collect()
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Nullable(inner) => write!(f, "{}?", inner),
            Schema::Tuple(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Schema::Object(fields) => write_fields(fields, f),
            Schema::Array(element, props) => {
                write!(f, "array<{}>", element)?;
                write_props(props, f)
            }
            Schema::Set(element, props) => {
                write!(f, "set<{}>", element)?;
                write_props(props, f)
            }
            Schema::Map(key, value, props) => {
                write!(f, "map<{}, {}>", key, value)?;
                write_props(props, f)
            }
            Schema::Instance(name) => write!(f, "instance {}", name),
            Schema::Recall(slot) => write!(f, "#{}", slot),
            leaf => f.write_str(leaf.kind().name()),
        }
    }
}

fn write_fields(fields: &Fields, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("{")?;
    for (i, (key, schema)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", key, schema)?;
    }
    f.write_str("}")
}

fn write_props(props: &Fields, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if props.is_empty() {
        return Ok(());
    }
    f.write_str(" & ")?;
    write_fields(props, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_is_idempotent() {
        let once = Schema::nullable(Schema::String);
        assert_eq!(Schema::nullable(once.clone()), once);
        assert_eq!(Schema::nullable(Schema::Any), Schema::Any);
        assert_eq!(
            Schema::nullable(Schema::Unknown),
            Schema::Nullable(Box::new(Schema::Unknown))
        );
    }

    #[test]
    fn test_slots_are_preorder_composites() {
        let schema = Schema::object([
            ("tags", Schema::array(Schema::String)),
            ("pair", Schema::tuple([Schema::Integer, Schema::object([("x", Schema::Number)])])),
            ("lookup", Schema::map(Schema::String, Schema::Recall(0))),
        ]);
        let kinds: Vec<Kind> = schema.slots().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![Kind::Object, Kind::Array, Kind::Object, Kind::Map]);
    }

    #[test]
    fn test_display() {
        let schema = Schema::array_with(
            Schema::object([("a", Schema::Integer), ("b", Schema::nullable(Schema::String))]),
            [("total", Schema::Number)],
        );
        assert_eq!(
            schema.to_string(),
            "array<{a: integer, b: string?}> & {total: number}"
        );
        assert_eq!(
            Schema::map(Schema::String, Schema::set(Schema::Date)).to_string(),
            "map<string, set<date>>"
        );
    }
}
