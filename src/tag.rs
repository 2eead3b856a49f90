//! Byte tag table
//!
//! One byte identifies each schema node kind in the schema section of a
//! stream. A handful of sentinel values at the top of the byte range mark
//! data-section events; every tag stays below [`RESERVED_START`] so the two
//! never alias.

/// Schema node kind as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// No value observed yet
    Unknown = 0x00,
    /// Fully dynamic, schema written inline per value
    Any = 0x01,
    /// `true` / `false`
    Boolean = 0x02,
    /// Single Unicode scalar value
    Character = 0x03,
    /// Raw byte buffer
    Binary = 0x04,
    /// Integral number, sign-magnitude varint
    Integer = 0x05,
    /// Non-negative integral number, plain varint
    PositiveInteger = 0x06,
    /// Arbitrary-precision integer
    BigInteger = 0x07,
    /// IEEE-754 double
    Number = 0x08,
    /// UTF-8 string
    String = 0x09,
    /// Regular expression source and flags
    RegExp = 0x0A,
    /// Milliseconds since the Unix epoch
    Date = 0x0B,
    /// Inner node or null/undefined
    Nullable = 0x0C,
    /// Fixed-arity positional sequence
    Tuple = 0x0D,
    /// Record with schema-fixed keys
    Object = 0x0E,
    /// Homogeneous sequence
    Array = 0x0F,
    /// Homogeneous unordered collection
    Set = 0x10,
    /// Keyed collection
    Map = 0x11,
    /// Registered class instance
    Instance = 0x12,
    /// Reference to an earlier composite node
    Recall = 0x13,
}

impl Kind {
    /// All kinds in tag order
    pub const ALL: [Kind; 20] = [
        Kind::Unknown,
        Kind::Any,
        Kind::Boolean,
        Kind::Character,
        Kind::Binary,
        Kind::Integer,
        Kind::PositiveInteger,
        Kind::BigInteger,
        Kind::Number,
        Kind::String,
        Kind::RegExp,
        Kind::Date,
        Kind::Nullable,
        Kind::Tuple,
        Kind::Object,
        Kind::Array,
        Kind::Set,
        Kind::Map,
        Kind::Instance,
        Kind::Recall,
    ];

    /// Wire byte for this kind
    #[inline]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Look up the kind for a wire byte
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Kind> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Lower-case name used in messages and schema rendering
    pub const fn name(self) -> &'static str {
        match self {
            Kind::Unknown => "unknown",
            Kind::Any => "any",
            Kind::Boolean => "boolean",
            Kind::Character => "character",
            Kind::Binary => "binary",
            Kind::Integer => "integer",
            Kind::PositiveInteger => "positive",
            Kind::BigInteger => "bigint",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::RegExp => "regexp",
            Kind::Date => "date",
            Kind::Nullable => "nullable",
            Kind::Tuple => "tuple",
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Set => "set",
            Kind::Map => "map",
            Kind::Instance => "instance",
            Kind::Recall => "recall",
        }
    }

    /// Kinds with identity that take part in object memory and recall slots
    #[inline]
    pub const fn is_slotted(self) -> bool {
        matches!(self, Kind::Object | Kind::Array | Kind::Set | Kind::Map)
    }
}

/// First byte value reserved for sentinels
pub const RESERVED_START: u8 = 0xF8;

/// Start of a freshly written composite, or a present nullable value
pub const START: u8 = 0xF8;

/// Nullable holds `null`
pub const NULL: u8 = 0xF9;

/// Nullable holds `undefined`
pub const UNDEFINED: u8 = 0xFA;

/// End of an object's (or side-property) member list in schema bytes
pub const STOP: u8 = 0xFB;

/// Repeated string, followed by a string memory index
pub const STRING_REFERENCE: u8 = 0xFE;

/// Repeated composite, followed by an object memory index
pub const REFERENCE: u8 = 0xFF;

/// String terminator
pub const END_OF_STRING: u8 = 0x00;
