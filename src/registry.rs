//! Class registry
//!
//! Registering a class compiles its (object) schema once and files it under a
//! name. Values of that class are then written as `Instance(name)` and come
//! back as instances of the same class. The registry is shared: clones are
//! handles onto the same table, and a process-wide table is available through
//! [`Registry::global`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::config::Config;
use crate::dispatch::{compile_schema, Decoding, Dispatcher, Encoding};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::schema::{Fields, Schema};
use crate::value::Value;

/// Constructor handle for registered instances
///
/// Two classes are the same class only if they are the same allocation, so
/// two `Class::new("Point")` calls give distinct constructors.
pub struct Class {
    name: String,
}

impl Class {
    /// New constructor with a default registration name
    pub fn new(name: impl Into<String>) -> Arc<Class> {
        Arc::new(Class { name: name.into() })
    }

    /// Default registration name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build an instance of this class
    pub fn construct<K: Into<String>>(
        self: &Arc<Self>,
        fields: impl IntoIterator<Item = (K, Value)>,
    ) -> Value {
        Value::instance(self, fields)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({} @ {:p})", self.name, self)
    }
}

/// One registered class
#[derive(Debug)]
pub struct RegistryEntry {
    name: String,
    class: Arc<Class>,
    schema: Schema,
    encoder: Dispatcher<Encoding>,
    decoder: Dispatcher<Decoding>,
}

impl RegistryEntry {
    /// Name the class is filed under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constructor used for decoded instances
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Registered schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Compiled encoding handle
    pub fn encoder(&self) -> &Dispatcher<Encoding> {
        &self.encoder
    }

    /// Compiled decoding handle
    pub fn decoder(&self) -> &Dispatcher<Decoding> {
        &self.decoder
    }
}

/// Shared table of registered classes
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<Vec<Arc<RegistryEntry>>>>,
}

impl Registry {
    /// Empty, independent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by the free functions
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Register `class` with an object schema
    ///
    /// `name` defaults to the class name. The table is append-only: a name
    /// already held by a different class, or by the same class with another
    /// schema, is rejected with [`Error::DuplicateRegistration`]. Repeating
    /// an identical registration returns the existing entry.
    ///
    /// `Recall(0)` inside `schema` stands for the class itself, so nested
    /// instances reached through it decode with their class.
    pub fn register(
        &self,
        class: &Arc<Class>,
        schema: Schema,
        name: Option<&str>,
    ) -> Result<Arc<RegistryEntry>> {
        if !matches!(schema, Schema::Object(_)) {
            return Err(Error::UnsupportedSchema(
                "registered classes need an object schema",
            ));
        }
        let name = name.unwrap_or(class.name()).to_owned();

        if let Some(existing) = self.find_by_name(&name) {
            if Arc::ptr_eq(&existing.class, class) && existing.schema == schema {
                return Ok(existing);
            }
            log::warn!("[registry] name {:?} is already registered", name);
            return Err(Error::DuplicateRegistration(name));
        }

        let mut scratch = Encoder::new(self.clone(), &Config::default());
        let encoder = compile_schema(&bind_self(&schema, &name), &mut scratch)?;
        let entry = Arc::new(RegistryEntry {
            decoder: encoder.to_decoder(),
            encoder,
            schema,
            class: Arc::clone(class),
            name,
        });

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.name == entry.name) {
            return Err(Error::DuplicateRegistration(entry.name.clone()));
        }
        entries.push(Arc::clone(&entry));

        log::debug!("[registry] registered {} as {}", entry.name, entry.schema);
        Ok(entry)
    }

    /// Entry filed under `name`
    pub fn find_by_name(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.read().iter().find(|e| e.name == name).cloned()
    }

    /// Entry for the class `value` was constructed from
    pub fn find_by_instance(&self, value: &Value) -> Option<Arc<RegistryEntry>> {
        match value {
            Value::Instance(instance) => self.find_by_constructor(instance.borrow().class()),
            _ => None,
        }
    }

    /// Entry registered for `class`
    pub fn find_by_constructor(&self, class: &Arc<Class>) -> Option<Arc<RegistryEntry>> {
        self.entries
            .read()
            .iter()
            .find(|e| Arc::ptr_eq(&e.class, class))
            .cloned()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Copy of `schema` with recalls of the root slot replaced by `Instance(name)`
fn bind_self(schema: &Schema, name: &str) -> Schema {
    let fields = |fields: &Fields| -> Fields {
        fields
            .iter()
            .map(|(key, child)| (key.clone(), bind_self(child, name)))
            .collect()
    };
    match schema {
        Schema::Recall(0) => Schema::Instance(name.to_owned()),
        Schema::Nullable(inner) => Schema::Nullable(Box::new(bind_self(inner, name))),
        Schema::Tuple(items) => Schema::Tuple(items.iter().map(|i| bind_self(i, name)).collect()),
        Schema::Object(members) => Schema::Object(fields(members)),
        Schema::Array(element, props) => {
            Schema::Array(Box::new(bind_self(element, name)), fields(props))
        }
        Schema::Set(element, props) => Schema::Set(Box::new(bind_self(element, name)), fields(props)),
        Schema::Map(key, value, props) => Schema::Map(
            Box::new(bind_self(key, name)),
            Box::new(bind_self(value, name)),
            fields(props),
        ),
        other => other.clone(),
    }
}
