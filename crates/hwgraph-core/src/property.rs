//! Property reflection: typed, per-adapter-type accessor tables.
//!
//! Every module registers, once per concrete adapter type, a
//! [`PropertyTable`] mapping property names to accessors. An accessor takes
//! the opaque `&dyn Adapter` handle, downcasts it to the concrete type it was
//! registered for and returns an optional [`PropertyValue`]. An absent value
//! means "not supported for this hardware or module", never an error.
//!
//! [`PropertyRegistry`] collects the tables of every enabled module and is
//! owned by the graph, which answers cross-adapter queries with it (see
//! [`TopologyGraph::property`](crate::graph::TopologyGraph::property)).

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::adapter::Adapter;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Unsigned,
    Signed,
    Float,
    Bool,
    Text,
}

impl PropertyType {
    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Unsigned => "unsigned",
            PropertyType::Signed => "signed",
            PropertyType::Float => "float",
            PropertyType::Bool => "bool",
            PropertyType::Text => "text",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A property value produced by an accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    pub fn value_type(&self) -> PropertyType {
        match self {
            PropertyValue::Unsigned(_) => PropertyType::Unsigned,
            PropertyValue::Signed(_) => PropertyType::Signed,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Text(_) => PropertyType::Text,
        }
    }
}

/// Default textual form: plain decimal numbers, `true`/`false`, raw text.
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Unsigned(v) => write!(f, "{v}"),
            PropertyValue::Signed(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Text(v) => f.write_str(v),
        }
    }
}

/// Rust types an accessor may return.
pub trait PropertyKind: Sized {
    const TYPE: PropertyType;

    fn into_value(self) -> PropertyValue;

    fn from_value(value: PropertyValue) -> Option<Self>;
}

macro_rules! unsigned_kind {
    ($($t:ty),*) => {$(
        impl PropertyKind for $t {
            const TYPE: PropertyType = PropertyType::Unsigned;

            fn into_value(self) -> PropertyValue {
                PropertyValue::Unsigned(u64::from(self))
            }

            fn from_value(value: PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::Unsigned(v) => <$t>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! signed_kind {
    ($($t:ty),*) => {$(
        impl PropertyKind for $t {
            const TYPE: PropertyType = PropertyType::Signed;

            fn into_value(self) -> PropertyValue {
                PropertyValue::Signed(i64::from(self))
            }

            fn from_value(value: PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::Signed(v) => <$t>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

unsigned_kind!(u8, u16, u32, u64);
signed_kind!(i8, i16, i32, i64);

impl PropertyKind for f64 {
    const TYPE: PropertyType = PropertyType::Float;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Float(self)
    }

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl PropertyKind for bool {
    const TYPE: PropertyType = PropertyType::Bool;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Bool(self)
    }

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl PropertyKind for String {
    const TYPE: PropertyType = PropertyType::Text;

    fn into_value(self) -> PropertyValue {
        PropertyValue::Text(self)
    }

    fn from_value(value: PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptors and tables
// ---------------------------------------------------------------------------

type Accessor = Box<dyn Fn(&dyn Adapter) -> Option<PropertyValue> + Send + Sync>;

/// A (name, declared type, bound accessor) triple.
pub struct PropertyDescriptor {
    name: &'static str,
    value_type: PropertyType,
    accessor: Accessor,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_type(&self) -> PropertyType {
        self.value_type
    }

    /// Applies the accessor. Returns `None` if the adapter is not of the
    /// type this descriptor was registered for.
    pub fn value(&self, adapter: &dyn Adapter) -> Option<PropertyValue> {
        (self.accessor)(adapter)
    }

    /// The single conversion path from a typed value to text.
    pub fn value_to_string(&self, adapter: &dyn Adapter) -> Option<String> {
        self.value(adapter).map(|v| v.to_string())
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

/// All property descriptors of one concrete adapter type, in registration
/// order.
#[derive(Debug)]
pub struct PropertyTable {
    adapter_type: TypeId,
    module: &'static str,
    descriptors: IndexMap<&'static str, PropertyDescriptor>,
}

impl PropertyTable {
    /// Starts a table for adapters of type `A` owned by `module`.
    pub fn builder<A: Adapter>(module: &'static str) -> PropertyTableBuilder<A> {
        PropertyTableBuilder {
            table: PropertyTable {
                adapter_type: TypeId::of::<A>(),
                module,
                descriptors: IndexMap::new(),
            },
            _adapter: PhantomData,
        }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.keys().copied()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Returns `true` if this table describes the concrete type of `adapter`.
    pub fn describes(&self, adapter: &dyn Adapter) -> bool {
        adapter.as_any().type_id() == self.adapter_type
    }
}

/// Typed builder so accessors are checked against the adapter type at
/// compile time.
pub struct PropertyTableBuilder<A> {
    table: PropertyTable,
    _adapter: PhantomData<fn(&A)>,
}

impl<A: Adapter> PropertyTableBuilder<A> {
    /// Registers a property. Registering the same name twice replaces the
    /// earlier accessor.
    pub fn property<T, F>(mut self, name: &'static str, accessor: F) -> Self
    where
        T: PropertyKind,
        F: Fn(&A) -> Option<T> + Send + Sync + 'static,
    {
        debug_assert!(
            !self.table.descriptors.contains_key(name),
            "property '{name}' registered twice for module '{}'",
            self.table.module
        );
        let descriptor = PropertyDescriptor {
            name,
            value_type: T::TYPE,
            accessor: Box::new(move |adapter: &dyn Adapter| {
                adapter
                    .as_any()
                    .downcast_ref::<A>()
                    .and_then(|a| accessor(a))
                    .map(PropertyKind::into_value)
            }),
        };
        self.table.descriptors.insert(name, descriptor);
        self
    }

    pub fn build(self) -> PropertyTable {
        self.table
    }
}

/// The property tables of every registered adapter type.
#[derive(Debug, Default)]
pub struct PropertyRegistry {
    tables: HashMap<TypeId, PropertyTable>,
    /// Registration order, for deterministic listings.
    order: Vec<TypeId>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. Returns `false` and keeps the existing table if the
    /// adapter type was already registered.
    pub fn register(&mut self, table: PropertyTable) -> bool {
        if self.tables.contains_key(&table.adapter_type) {
            tracing::debug!(
                module = table.module,
                "property table already registered, keeping the first one"
            );
            return false;
        }
        self.order.push(table.adapter_type);
        self.tables.insert(table.adapter_type, table);
        true
    }

    /// Looks up the table for the concrete type of `adapter`.
    pub fn table_for(&self, adapter: &dyn Adapter) -> Option<&PropertyTable> {
        self.tables.get(&adapter.as_any().type_id())
    }

    /// Iterates tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &PropertyTable> {
        self.order.iter().filter_map(|id| self.tables.get(id))
    }

    /// Applies the named accessor of the adapter's table.
    pub fn value(&self, adapter: &dyn Adapter, name: &str) -> Option<PropertyValue> {
        self.table_for(adapter)?.get(name)?.value(adapter)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Debug)]
    struct CacheAdapter {
        size: Option<u64>,
        inclusive: bool,
    }

    impl Adapter for CacheAdapter {
        fn module(&self) -> &'static str {
            "cache"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct OtherAdapter;

    impl Adapter for OtherAdapter {
        fn module(&self) -> &'static str {
            "other"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn cache_table() -> PropertyTable {
        PropertyTable::builder::<CacheAdapter>("cache")
            .property("cache_size", |a: &CacheAdapter| a.size)
            .property("inclusive", |a: &CacheAdapter| Some(a.inclusive))
            .build()
    }

    #[test]
    fn value_to_string_uses_default_textual_form() {
        let table = cache_table();
        let adapter = CacheAdapter {
            size: Some(32768),
            inclusive: true,
        };
        let size = table.get("cache_size").unwrap();
        assert_eq!(size.value_type(), PropertyType::Unsigned);
        assert_eq!(size.value_to_string(&adapter).as_deref(), Some("32768"));
        assert_eq!(
            table.get("inclusive").unwrap().value_to_string(&adapter).as_deref(),
            Some("true")
        );
    }

    #[test]
    fn absent_value_is_none_not_error() {
        let table = cache_table();
        let adapter = CacheAdapter {
            size: None,
            inclusive: false,
        };
        assert_eq!(table.get("cache_size").unwrap().value_to_string(&adapter), None);
    }

    #[test]
    fn accessor_ignores_foreign_adapter_types() {
        let table = cache_table();
        assert!(!table.describes(&OtherAdapter));
        assert_eq!(table.get("inclusive").unwrap().value(&OtherAdapter), None);
    }

    #[test]
    fn names_keep_registration_order() {
        let names: Vec<_> = cache_table().names().collect();
        assert_eq!(names, vec!["cache_size", "inclusive"]);
    }

    #[test]
    fn registry_keeps_first_table_per_type() {
        let mut registry = PropertyRegistry::new();
        assert!(registry.register(cache_table()));
        assert!(!registry.register(
            PropertyTable::builder::<CacheAdapter>("cache").build()
        ));
        assert_eq!(registry.len(), 1);

        let adapter = CacheAdapter {
            size: Some(1),
            inclusive: false,
        };
        assert_eq!(
            registry.value(&adapter, "cache_size"),
            Some(PropertyValue::Unsigned(1))
        );
        assert_eq!(registry.value(&OtherAdapter, "cache_size"), None);
    }

    #[test]
    fn typed_roundtrip_through_property_value() {
        assert_eq!(u32::from_value(PropertyValue::Unsigned(7)), Some(7u32));
        assert_eq!(u8::from_value(PropertyValue::Unsigned(300)), None);
        assert_eq!(String::from_value(PropertyValue::Unsigned(1)), None);
        assert_eq!((-3i32).into_value(), PropertyValue::Signed(-3));
        assert_eq!(PropertyValue::Float(1.5).to_string(), "1.5");
    }
}
