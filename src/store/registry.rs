//! In-memory tag registry.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::core::data::{Tag, TagSpec, Value, ValueKind};
use crate::core::error::{Result, SimError};

use super::snapshot::TelemetrySnapshot;

/// Ordered table of tags, keyed by name.
///
/// Iteration follows schema order. Tags are never added or removed after
/// construction; unknown names fail with [`SimError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    tags: IndexMap<String, Tag>,
}

impl TagTable {
    /// Build a table from a schema. Duplicate names are rejected.
    pub fn from_specs(specs: &[TagSpec]) -> Result<Self> {
        let mut tags = IndexMap::with_capacity(specs.len());
        for spec in specs {
            if spec.name.is_empty() {
                return Err(SimError::config("Tag name must not be empty"));
            }
            if tags
                .insert(spec.name.clone(), Tag::from_spec(spec))
                .is_some()
            {
                return Err(SimError::config(format!("Duplicate tag: {}", spec.name)));
            }
        }
        Ok(Self { tags })
    }

    /// Look up a tag.
    pub fn tag(&self, name: &str) -> Result<&Tag> {
        self.tags.get(name).ok_or_else(|| SimError::not_found(name))
    }

    /// Current value of a tag.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.tag(name).map(Tag::value)
    }

    /// Current value of a float tag.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let tag = self.tag(name)?;
        tag.value()
            .as_f64()
            .ok_or_else(|| mismatch(name, tag.kind(), ValueKind::Float))
    }

    /// Current value of a bool tag.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let tag = self.tag(name)?;
        tag.value()
            .as_bool()
            .ok_or_else(|| mismatch(name, tag.kind(), ValueKind::Bool))
    }

    /// Declared kind of a tag.
    pub fn kind_of(&self, name: &str) -> Result<ValueKind> {
        self.tag(name).map(Tag::kind)
    }

    /// Check that a tag exists and is declared as `kind`.
    pub fn expect_kind(&self, name: &str, kind: ValueKind) -> Result<()> {
        let declared = self.kind_of(name)?;
        if declared != kind {
            return Err(mismatch(name, declared, kind));
        }
        Ok(())
    }

    /// Assign a value. The stored value is unchanged on error.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.tags
            .get_mut(name)
            .ok_or_else(|| SimError::not_found(name))?
            .assign(value.into())
    }

    /// Whether a tag exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Number of tags.
    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate tags in schema order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }
}

fn mismatch(name: &str, expected: ValueKind, actual: ValueKind) -> SimError {
    SimError::TypeMismatch {
        tag: name.to_string(),
        expected,
        actual,
    }
}

/// Process-wide tag registry.
///
/// One lock guards the whole table: a tick runs as a single [`Registry::update`]
/// so protocol clients and snapshots never observe a half-applied tick.
/// The lock is never held across an `.await`.
///
/// # Example
///
/// ```rust
/// use procsim::core::data::{TagSpec, Value};
/// use procsim::store::Registry;
///
/// let registry = Registry::from_specs(&[TagSpec::new("level", 10.0).writable()]).unwrap();
/// registry.set("level", Value::Float(42.0)).unwrap();
/// assert_eq!(registry.get("level").unwrap(), Value::Float(42.0));
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    table: RwLock<TagTable>,
}

impl Registry {
    /// Wrap an existing table.
    pub fn new(table: TagTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Build a registry from a schema.
    pub fn from_specs(specs: &[TagSpec]) -> Result<Self> {
        TagTable::from_specs(specs).map(Self::new)
    }

    // A panic while holding the lock cannot leave a tag with a foreign kind,
    // so a poisoned lock is still safe to use.
    fn read_guard(&self) -> RwLockReadGuard<'_, TagTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, TagTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a tag.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.read_guard().get(name)
    }

    /// Copy of a tag, including its timestamp and writable flag.
    pub fn tag(&self, name: &str) -> Result<Tag> {
        self.read_guard().tag(name).cloned()
    }

    /// Assign a value from inside the process.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.write_guard().set(name, value)
    }

    /// Assign a value on behalf of an external client.
    ///
    /// Same as [`Registry::set`] but also fails with [`SimError::ReadOnly`]
    /// when the tag's writable flag is off.
    pub fn write_external(&self, name: &str, value: Value) -> Result<()> {
        let mut table = self.write_guard();
        if !table.tag(name)?.is_writable() {
            return Err(SimError::ReadOnly {
                tag: name.to_string(),
            });
        }
        table.set(name, value)
    }

    /// Point-in-time copy of the named tags.
    pub fn snapshot<S: AsRef<str>>(&self, names: &[S]) -> Result<TelemetrySnapshot> {
        let table = self.read_guard();
        let mut values = IndexMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            values.insert(name.to_string(), table.get(name)?);
        }
        Ok(TelemetrySnapshot::new(values))
    }

    /// Run `f` with exclusive access to the whole table.
    pub fn update<T>(&self, f: impl FnOnce(&mut TagTable) -> Result<T>) -> Result<T> {
        f(&mut self.write_guard())
    }

    /// Run `f` with shared access to the whole table.
    pub fn read<T>(&self, f: impl FnOnce(&TagTable) -> T) -> T {
        f(&self.read_guard())
    }

    /// Copies of all tags in schema order.
    pub fn tags(&self) -> Vec<Tag> {
        self.read_guard().iter().cloned().collect()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }
}
