//! Adapters: module-owned handles attached to vertices.
//!
//! An adapter binds one vertex to one native object of one backend module
//! (a hardware-locality object, a GPU device index, a cluster node entry).
//! The graph owns every attached adapter in an index-keyed arena; vertices
//! only store [`AdapterId`](crate::id::AdapterId)s in attachment order.
//!
//! Adapters are queried through the property tables their module registers
//! (see [`crate::property`]), never through per-module code at the call site.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-supplied identifier that matches the same physical device across
/// modules, e.g. a PCI bus/device/function id.
///
/// Keys are opaque: the core only compares them for equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        CorrelationKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationKey {
    fn from(key: &str) -> Self {
        CorrelationKey(key.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(key: String) -> Self {
        CorrelationKey(key)
    }
}

/// A per-vertex handle owned by one backend module.
///
/// Implementors are plain structs; their typed accessors are exposed to the
/// rest of the system by registering a
/// [`PropertyTable`](crate::property::PropertyTable) for the concrete type.
pub trait Adapter: Any + Send + Sync + fmt::Debug {
    /// Name of the module that created this adapter.
    fn module(&self) -> &'static str;

    /// The key this adapter's native object is correlated by, if the backend
    /// can report one.
    fn correlation_key(&self) -> Option<CorrelationKey> {
        None
    }

    /// Upcast for downcasting to the concrete adapter type.
    fn as_any(&self) -> &dyn Any;
}
