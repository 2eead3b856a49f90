//! Runtime values the codec can carry
//!
//! `Value` is the closed set of value kinds the codec ever receives. Scalars
//! are held inline; composites are `Rc<RefCell<_>>` so that one object may be
//! reachable from several places (or from itself) and the codec can preserve
//! that sharing across a round trip.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::registry::Class;

/// Shared, mutable composite storage
pub type Shared<T> = Rc<RefCell<T>>;

/// Regular expression, carried as source text and flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RegExp {
    /// Pattern source
    pub source: String,
    /// Flag letters
    pub flags: String,
}

/// Insertion-ordered string-keyed record
#[derive(Clone, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

/// Sequence with optional non-index side properties
#[derive(Clone, Default)]
pub struct Array {
    /// Indexed elements
    pub items: Vec<Value>,
    /// Non-index properties
    pub props: Object,
}

/// Insertion-ordered collection of distinct values
#[derive(Clone, Default)]
pub struct Set {
    items: Vec<Value>,
    /// Non-index properties
    pub props: Object,
}

/// Insertion-ordered key/value collection with arbitrary keys
#[derive(Clone, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
    /// Non-index properties
    pub props: Object,
}

/// Instance of a registered class
#[derive(Clone)]
pub struct Instance {
    class: Arc<Class>,
    /// Field values
    pub fields: Object,
}

/// A value the codec can infer, encode and decode
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean
    Boolean(bool),
    /// Double-precision number (integers included)
    Number(f64),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Text
    String(String),
    /// Typed byte buffer
    Binary(Vec<u8>),
    /// Milliseconds since the Unix epoch
    Date(i64),
    /// Regular expression
    RegExp(RegExp),
    /// Callable; never serializable
    Function(String),
    /// Plain record
    Object(Shared<Object>),
    /// Sequence
    Array(Shared<Array>),
    /// Set of values
    Set(Shared<Set>),
    /// Keyed collection
    Map(Shared<Map>),
    /// Registered class instance
    Instance(Shared<Instance>),
}

impl Object {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a key, keeping its original position if it already exists
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

impl Set {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; returns false if an equal value was already present
    pub fn add(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    /// Append without the membership check; the decoder only sees members
    /// that were distinct when written
    pub(crate) fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Membership under [`Value::same_value`]
    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|v| v.same_value(value))
    }

    /// Members in insertion order
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Map {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, keeping its original position if it already exists
    pub fn set(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| k.same_value(&key)) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub(crate) fn push(&mut self, key: Value, value: Value) {
        self.entries.push((key, value));
    }

    /// Look up a key under [`Value::same_value`]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.same_value(key))
            .map(|(_, v)| v)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Instance {
    /// Create an instance of `class`
    pub fn new(class: &Arc<Class>, fields: Object) -> Self {
        Self {
            class: Arc::clone(class),
            fields,
        }
    }

    /// Class this instance was constructed from
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }
}

impl Value {
    /// New plain object from key/value pairs
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Object(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    /// New array from elements
    pub fn array(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(Array {
            items: items.into_iter().collect(),
            props: Object::new(),
        })))
    }

    /// New set; duplicate members are dropped
    pub fn set(items: impl IntoIterator<Item = Value>) -> Value {
        let mut set = Set::new();
        for item in items {
            set.add(item);
        }
        Value::Set(Rc::new(RefCell::new(set)))
    }

    /// New map from key/value pairs
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Value {
        let mut map = Map::new();
        for (k, v) in entries {
            map.set(k, v);
        }
        Value::Map(Rc::new(RefCell::new(map)))
    }

    /// New instance of a registered class
    pub fn instance<K: Into<String>>(
        class: &Arc<Class>,
        fields: impl IntoIterator<Item = (K, Value)>,
    ) -> Value {
        Value::Instance(Rc::new(RefCell::new(Instance::new(
            class,
            fields.into_iter().collect(),
        ))))
    }

    /// New regular expression
    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Value {
        Value::RegExp(RegExp {
            source: source.into(),
            flags: flags.into(),
        })
    }

    /// Kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Date(_) => "date",
            Value::RegExp(_) => "regexp",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Instance(_) => "instance",
        }
    }

    /// True for `null` and `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Number payload
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Field of an object or instance (undefined for everything else)
    pub fn get(&self, key: &str) -> Value {
        let found = match self {
            Value::Object(o) => o.borrow().get(key).cloned(),
            Value::Instance(i) => i.borrow().fields.get(key).cloned(),
            _ => None,
        };
        found.unwrap_or(Value::Undefined)
    }

    /// Element of an array (undefined when out of range or not an array)
    pub fn at(&self, index: usize) -> Value {
        let found = match self {
            Value::Array(a) => a.borrow().items.get(index).cloned(),
            _ => None,
        };
        found.unwrap_or(Value::Undefined)
    }

    /// Address of a composite's shared storage
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Array(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Set(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Map(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Instance(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            _ => None,
        }
    }

    /// True when both values are the same composite
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Set/map key equality: identity for composites, value equality for
    /// scalars with `NaN` equal to itself and `0 == -0`
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => self.same_identity(other),
        }
    }

    /// Structural equality that follows cycles and requires aliasing on one
    /// side to be mirrored on the other
    pub fn deep_eq(&self, other: &Value) -> bool {
        DeepEq::default().eq(self, other)
    }
}

#[derive(Default)]
struct DeepEq {
    left: HashMap<usize, usize>,
    right: HashMap<usize, usize>,
}

impl DeepEq {
    fn eq(&mut self, a: &Value, b: &Value) -> bool {
        if let (Some(ia), Some(ib)) = (a.identity(), b.identity()) {
            match (self.left.get(&ia), self.right.get(&ib)) {
                (Some(&seen_b), Some(&seen_a)) => return seen_b == ib && seen_a == ia,
                (None, None) => {
                    self.left.insert(ia, ib);
                    self.right.insert(ib, ia);
                }
                _ => return false,
            }
        }

        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::Binary(x), Value::Binary(y)) => x == y,
            (Value::RegExp(x), Value::RegExp(y)) => x == y,
            (Value::Function(x), Value::Function(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => self.objects(&x.borrow(), &y.borrow()),
            (Value::Array(x), Value::Array(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                self.lists(&x.items, &y.items) && self.objects(&x.props, &y.props)
            }
            (Value::Set(x), Value::Set(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                self.lists(&x.items, &y.items) && self.objects(&x.props, &y.props)
            }
            (Value::Map(x), Value::Map(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                x.entries.len() == y.entries.len()
                    && x
                        .entries
                        .iter()
                        .zip(&y.entries)
                        .all(|((ka, va), (kb, vb))| self.eq(ka, kb) && self.eq(va, vb))
                    && self.objects(&x.props, &y.props)
            }
            (Value::Instance(x), Value::Instance(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                Arc::ptr_eq(&x.class, &y.class) && self.objects(&x.fields, &y.fields)
            }
            _ => a.same_value(b) && a.identity().is_none(),
        }
    }

    fn lists(&mut self, a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.eq(x, y))
    }

    fn objects(&mut self, a: &Object, b: &Object) -> bool {
        let defined = |o: &Object| o.iter().filter(|(_, v)| !matches!(v, Value::Undefined)).count();
        if defined(a) != defined(b) {
            return false;
        }
        a.iter()
            .filter(|(_, v)| !matches!(v, Value::Undefined))
            .all(|(k, v)| match b.get(k) {
                Some(w) => self.eq(v, w),
                None => false,
            })
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Value::BigInt(b)
    }
}

impl From<RegExp> for Value {
    fn from(r: RegExp) -> Self {
        Value::RegExp(r)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(self, f, &mut Vec::new())
    }
}

fn write_value(value: &Value, f: &mut fmt::Formatter<'_>, stack: &mut Vec<usize>) -> fmt::Result {
    if let Some(id) = value.identity() {
        if stack.contains(&id) {
            return f.write_str("[Circular]");
        }
        stack.push(id);
    }

    let result = match value {
        Value::Undefined => f.write_str("undefined"),
        Value::Null => f.write_str("null"),
        Value::Boolean(b) => write!(f, "{}", b),
        Value::Number(n) => write!(f, "{:?}", n),
        Value::BigInt(b) => write!(f, "{:?}", b),
        Value::String(s) => write!(f, "{:?}", s),
        Value::Binary(b) => write!(f, "Binary({:02x?})", b),
        Value::Date(ms) => write!(f, "Date({})", ms),
        Value::RegExp(r) => write!(f, "/{}/{}", r.source, r.flags),
        Value::Function(name) => write!(f, "[Function {}]", name),
        Value::Object(o) => write_object(&o.borrow(), f, stack),
        Value::Array(a) => {
            let a = a.borrow();
            write_list("[", &a.items, "]", f, stack)?;
            write_props(&a.props, f, stack)
        }
        Value::Set(s) => {
            let s = s.borrow();
            write_list("Set {", &s.items, "}", f, stack)?;
            write_props(&s.props, f, stack)
        }
        Value::Map(m) => {
            let m = m.borrow();
            f.write_str("Map {")?;
            for (i, (k, v)) in m.entries.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(k, f, stack)?;
                f.write_str(" => ")?;
                write_value(v, f, stack)?;
            }
            f.write_str("}")?;
            write_props(&m.props, f, stack)
        }
        Value::Instance(i) => {
            let i = i.borrow();
            write!(f, "{} ", i.class.name())?;
            write_object(&i.fields, f, stack)
        }
    };

    if value.identity().is_some() {
        stack.pop();
    }
    result
}

fn write_list(
    open: &str,
    items: &[Value],
    close: &str,
    f: &mut fmt::Formatter<'_>,
    stack: &mut Vec<usize>,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_value(item, f, stack)?;
    }
    f.write_str(close)
}

fn write_object(object: &Object, f: &mut fmt::Formatter<'_>, stack: &mut Vec<usize>) -> fmt::Result {
    f.write_str("{")?;
    for (i, (k, v)) in object.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: ", k)?;
        write_value(v, f, stack)?;
    }
    f.write_str("}")
}

fn write_props(props: &Object, f: &mut fmt::Formatter<'_>, stack: &mut Vec<usize>) -> fmt::Result {
    if props.is_empty() {
        return Ok(());
    }
    f.write_str(" & ")?;
    write_object(props, f, stack)
}
