//! Schema inference and join
//!
//! Inference walks a value once. Every composite seen for the first time gets
//! a provisional id (value-traversal order) and its inferred schema is stored
//! under that id; a composite seen again becomes `Recall(provisional id)`.
//! Element schemas of arrays, sets and maps are the join of their members.
//! Once the walk is over, each provisional recall is renumbered to the first
//! pre-order slot of the final tree whose layout equals the remembered one,
//! or widened to `Any` if no slot matches.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema::{Fields, Schema};
use crate::value::{Object, Value};
use crate::DEFAULT_MAX_DEPTH;

/// Largest integer a double holds exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One inference pass over one value
pub struct Inference<'r> {
    registry: Option<&'r Registry>,
    seen: HashMap<usize, usize>,
    memory: Vec<Option<Schema>>,
    max_depth: usize,
    depth: usize,
}

impl<'r> Inference<'r> {
    /// Inference consulting `registry` for class instances
    pub fn new(registry: Option<&'r Registry>) -> Self {
        Self {
            registry,
            seen: HashMap::new(),
            memory: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Set the nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Infer the schema of `value`
    pub fn infer(mut self, value: &Value) -> Result<Schema> {
        let raw = self.visit(value)?;
        let slots = raw.slots();
        Ok(self.renumber(&raw, &slots))
    }

    fn visit(&mut self, value: &Value) -> Result<Schema> {
        let schema = match value {
            Value::Undefined | Value::Null => Schema::nullable(Schema::Unknown),
            Value::Boolean(_) => Schema::Boolean,
            Value::Number(n) if is_safe_integer(*n) => Schema::Integer,
            Value::Number(_) => Schema::Number,
            Value::BigInt(_) => Schema::BigInteger,
            Value::String(_) => Schema::String,
            Value::Binary(_) => Schema::Binary,
            Value::Date(_) => Schema::Date,
            Value::RegExp(_) => Schema::RegExp,
            Value::Function(_) => return Err(Error::UnsupportedValue("function")),
            Value::Instance(_) => match self.registry.and_then(|r| r.find_by_instance(value)) {
                Some(entry) => Schema::Instance(entry.name().to_owned()),
                None => self.composite(value)?,
            },
            _ => self.composite(value)?,
        };
        Ok(schema)
    }

    fn composite(&mut self, value: &Value) -> Result<Schema> {
        let Some(id) = value.identity() else {
            return Err(Error::UnsupportedValue(value.kind_name()));
        };
        if let Some(&provisional) = self.seen.get(&id) {
            return Ok(Schema::Recall(provisional));
        }

        if self.depth >= self.max_depth {
            return Err(Error::DepthLimit(self.max_depth));
        }
        self.depth += 1;

        let provisional = self.memory.len();
        self.memory.push(None);
        self.seen.insert(id, provisional);

        let result = self.layout(value);
        self.depth -= 1;
        let schema = result?;

        self.memory[provisional] = Some(schema.clone());
        Ok(schema)
    }

    fn layout(&mut self, value: &Value) -> Result<Schema> {
        let schema = match value {
            Value::Object(object) => Schema::Object(self.fields(&object.borrow())?),
            Value::Instance(instance) => Schema::Object(self.fields(&instance.borrow().fields)?),
            Value::Array(array) => {
                let array = array.borrow();
                let element = self.elements(&array.items)?;
                Schema::Array(Box::new(element), self.fields(&array.props)?)
            }
            Value::Set(set) => {
                let set = set.borrow();
                let element = self.elements(set.items())?;
                Schema::Set(Box::new(element), self.fields(&set.props)?)
            }
            Value::Map(map) => {
                let map = map.borrow();
                let mut key = Schema::Unknown;
                let mut val = Schema::Unknown;
                for (k, v) in map.entries() {
                    let k = self.visit(k)?;
                    key = self.join(&key, &k);
                    let v = self.visit(v)?;
                    val = self.join(&val, &v);
                }
                Schema::Map(Box::new(key), Box::new(val), self.fields(&map.props)?)
            }
            other => return Err(Error::UnsupportedValue(other.kind_name())),
        };
        Ok(schema)
    }

    fn fields(&mut self, object: &Object) -> Result<Fields> {
        let mut fields = Fields::with_capacity(object.len());
        for (key, value) in object.iter() {
            fields.push((key.to_owned(), self.visit(value)?));
        }
        Ok(fields)
    }

    fn elements(&mut self, items: &[Value]) -> Result<Schema> {
        let mut element = Schema::Unknown;
        for item in items {
            let schema = self.visit(item)?;
            element = self.join(&element, &schema);
        }
        Ok(element)
    }

    /// Least schema admitting both `a` and `b`
    pub fn join(&self, a: &Schema, b: &Schema) -> Schema {
        self.join_at(a, b, 0)
    }

    fn join_at(&self, a: &Schema, b: &Schema, depth: usize) -> Schema {
        if depth >= self.max_depth {
            log::trace!("[infer] join too deep, widening to any");
            return Schema::Any;
        }

        let (a, a_nullable) = unwrap_nullable(a);
        let (b, b_nullable) = unwrap_nullable(b);
        let joined = self.join_inner(a, b, depth + 1);
        if a_nullable || b_nullable {
            Schema::nullable(joined)
        } else {
            joined
        }
    }

    fn join_inner(&self, a: &Schema, b: &Schema, depth: usize) -> Schema {
        match (a, b) {
            (Schema::Unknown, other) | (other, Schema::Unknown) => other.clone(),
            (Schema::Any, _) | (_, Schema::Any) => Schema::Any,
            (Schema::Recall(i), Schema::Recall(j)) => {
                if i == j {
                    Schema::Recall(*i)
                } else {
                    Schema::Any
                }
            }
            (Schema::Recall(i), other) | (other, Schema::Recall(i)) => match self.remembered(*i) {
                Some(schema) => self.join_at(schema, other, depth),
                None => Schema::Any,
            },
            (x, y) if x == y => x.clone(),
            (Schema::Integer, Schema::Number) | (Schema::Number, Schema::Integer) => Schema::Number,
            (Schema::Tuple(xs), Schema::Tuple(ys)) if xs.len() == ys.len() => Schema::Tuple(
                xs.iter()
                    .zip(ys)
                    .map(|(x, y)| self.join_at(x, y, depth))
                    .collect(),
            ),
            (Schema::Object(xs), Schema::Object(ys)) => {
                Schema::Object(self.join_fields(xs, ys, depth))
            }
            (Schema::Array(ex, px), Schema::Array(ey, py)) => Schema::Array(
                Box::new(self.join_at(ex, ey, depth)),
                self.join_fields(px, py, depth),
            ),
            (Schema::Set(ex, px), Schema::Set(ey, py)) => Schema::Set(
                Box::new(self.join_at(ex, ey, depth)),
                self.join_fields(px, py, depth),
            ),
            (Schema::Map(kx, vx, px), Schema::Map(ky, vy, py)) => Schema::Map(
                Box::new(self.join_at(kx, ky, depth)),
                Box::new(self.join_at(vx, vy, depth)),
                self.join_fields(px, py, depth),
            ),
            _ => Schema::Any,
        }
    }

    /// Member-wise join; a key missing on one side becomes nullable
    ///
    /// When both sides list the same keys in the same order that order is
    /// kept, otherwise the union is sorted so the result does not depend on
    /// argument order.
    fn join_fields(&self, xs: &Fields, ys: &Fields, depth: usize) -> Fields {
        let same_order = xs.len() == ys.len() && xs.iter().zip(ys).all(|((a, _), (b, _))| a == b);

        let mut keys: Vec<&str> = xs.iter().map(|(k, _)| k.as_str()).collect();
        for (key, _) in ys {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        if !same_order {
            keys.sort_unstable();
        }

        keys.into_iter()
            .map(|key| {
                let schema = match (lookup(xs, key), lookup(ys, key)) {
                    (Some(x), Some(y)) => self.join_at(x, y, depth),
                    (Some(s), None) | (None, Some(s)) => Schema::nullable(s.clone()),
                    (None, None) => Schema::Unknown,
                };
                (key.to_owned(), schema)
            })
            .collect()
    }

    fn remembered(&self, provisional: usize) -> Option<&Schema> {
        self.memory.get(provisional).and_then(Option::as_ref)
    }

    /// Map provisional recalls onto pre-order slots of the final tree
    fn renumber(&self, schema: &Schema, slots: &[&Schema]) -> Schema {
        match schema {
            Schema::Recall(provisional) => {
                let slot = self
                    .remembered(*provisional)
                    .and_then(|target| slots.iter().position(|s| *s == target));
                match slot {
                    Some(slot) => Schema::Recall(slot),
                    None => {
                        log::trace!("[infer] no slot matches #{}, widening to any", provisional);
                        Schema::Any
                    }
                }
            }
            Schema::Nullable(inner) => Schema::nullable(self.renumber(inner, slots)),
            Schema::Tuple(items) => {
                Schema::Tuple(items.iter().map(|s| self.renumber(s, slots)).collect())
            }
            Schema::Object(fields) => Schema::Object(self.renumber_fields(fields, slots)),
            Schema::Array(element, props) => Schema::Array(
                Box::new(self.renumber(element, slots)),
                self.renumber_fields(props, slots),
            ),
            Schema::Set(element, props) => Schema::Set(
                Box::new(self.renumber(element, slots)),
                self.renumber_fields(props, slots),
            ),
            Schema::Map(key, value, props) => Schema::Map(
                Box::new(self.renumber(key, slots)),
                Box::new(self.renumber(value, slots)),
                self.renumber_fields(props, slots),
            ),
            leaf => leaf.clone(),
        }
    }

    fn renumber_fields(&self, fields: &Fields, slots: &[&Schema]) -> Fields {
        fields
            .iter()
            .map(|(key, schema)| (key.clone(), self.renumber(schema, slots)))
            .collect()
    }
}

/// Join two standalone schemas
///
/// Recalls can only be resolved within one inference pass, so here two
/// different recalls (or a recall and anything else) widen to `Any`.
pub fn join(a: &Schema, b: &Schema) -> Schema {
    Inference::new(None).join(a, b)
}

/// Integral and within ±(2^53 - 1); `-0` counts
pub fn is_safe_integer(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
}

fn unwrap_nullable(schema: &Schema) -> (&Schema, bool) {
    match schema {
        Schema::Nullable(inner) => (inner, true),
        other => (other, false),
    }
}

fn lookup<'a>(fields: &'a Fields, key: &str) -> Option<&'a Schema> {
    fields.iter().find(|(k, _)| k == key).map(|(_, s)| s)
}
