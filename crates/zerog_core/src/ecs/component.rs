//! # Component System
//!
//! Components are pure data with no behavior. A [`ComponentType`] is a
//! registered descriptor (stable id, name, default field table); a
//! [`ComponentInstance`] is one entity's copy of that table.
//!
//! Fields are TOML values so the same schema can come from a manifest file
//! or from a Rust struct via [`ComponentType::from_default`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};
use crate::memory::SlotHandle;

/// A component's field table (field name → value).
pub type Fields = toml::Table;

/// Stable numeric id of a registered component type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ComponentTypeId(u16);

impl ComponentTypeId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns the id as a registry index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Descriptor of a component type.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use zerog_core::ComponentType;
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Position {
///     x: f64,
///     y: f64,
/// }
///
/// let ty = ComponentType::from_default::<Position>(0, "Position").unwrap();
/// assert_eq!(ty.defaults["x"].as_float(), Some(0.0));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentType {
    /// Stable id, unique and below the game's `max_component_id`.
    pub id: ComponentTypeId,
    /// Unique human-readable name.
    pub name: String,
    /// Default value of every field. Also the schema: no other field names
    /// are accepted.
    #[serde(default)]
    pub defaults: Fields,
    /// Hard cap on pooled instance slots for this type.
    #[serde(default)]
    pub pool_limit: Option<usize>,
}

impl ComponentType {
    /// Creates a descriptor from an explicit default table.
    #[must_use]
    pub fn new(id: u16, name: impl Into<String>, defaults: Fields) -> Self {
        Self {
            id: ComponentTypeId(id),
            name: name.into(),
            defaults,
            pool_limit: None,
        }
    }

    /// Creates a descriptor whose defaults are `T::default()` encoded as a table.
    ///
    /// # Errors
    ///
    /// [`EcsError::Encode`] if `T` does not serialize, and
    /// [`EcsError::InvalidConfig`] if it does not serialize to a table.
    pub fn from_default<T>(id: u16, name: impl Into<String>) -> EcsResult<Self>
    where
        T: Serialize + Default,
    {
        let name = name.into();
        match toml::Value::try_from(T::default())? {
            toml::Value::Table(defaults) => Ok(Self::new(id, name, defaults)),
            other => Err(EcsError::InvalidConfig(format!(
                "component `{name}` defaults must encode to a table, got {}",
                other.type_str()
            ))),
        }
    }

    /// Caps the number of instance slots pooled for this type.
    #[must_use]
    pub fn with_pool_limit(mut self, limit: usize) -> Self {
        self.pool_limit = Some(limit);
        self
    }

    /// Rejects any key of `values` that is not a declared field.
    pub(crate) fn check_fields(&self, values: &Fields) -> EcsResult<()> {
        match values.keys().find(|k| !self.defaults.contains_key(*k)) {
            Some(field) => Err(EcsError::UnknownField {
                component: self.id,
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Handle to one pooled component instance.
///
/// Stale once the instance is released; every lookup through a stale handle
/// fails instead of reaching the slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle {
    component_type: ComponentTypeId,
    slot: SlotHandle,
}

impl ComponentHandle {
    pub(crate) const fn new(component_type: ComponentTypeId, slot: SlotHandle) -> Self {
        Self {
            component_type,
            slot,
        }
    }

    /// Type of the instance behind this handle.
    #[inline]
    #[must_use]
    pub const fn component_type(self) -> ComponentTypeId {
        self.component_type
    }

    /// Slot inside the type's arena.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> SlotHandle {
        self.slot
    }
}

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.component_type, self.slot)
    }
}

/// One entity's data for one component type.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentInstance {
    component_type: ComponentTypeId,
    fields: Fields,
    changed: bool,
}

impl ComponentInstance {
    pub(crate) fn new(component_type: ComponentTypeId, defaults: Fields) -> Self {
        Self {
            component_type,
            fields: defaults,
            changed: false,
        }
    }

    /// Type of this instance.
    #[inline]
    #[must_use]
    pub const fn component_type(&self) -> ComponentTypeId {
        self.component_type
    }

    /// All field values.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// One field value.
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&toml::Value> {
        self.fields.get(field)
    }

    /// One field as a float, accepting integer values too.
    #[must_use]
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.fields.get(field)? {
            toml::Value::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            toml::Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Overwrites one declared field.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownField`] if `field` is not part of the schema.
    pub fn set(&mut self, field: &str, value: impl Into<toml::Value>) -> EcsResult<()> {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(EcsError::UnknownField {
                component: self.component_type,
                field: field.to_owned(),
            }),
        }
    }

    /// Whether the instance was acquired or marked changed in the last flush.
    #[inline]
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        self.changed
    }

    /// Decodes the field table into a Rust value.
    ///
    /// # Errors
    ///
    /// [`EcsError::Decode`] if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> EcsResult<T> {
        Ok(toml::Value::Table(self.fields.clone()).try_into()?)
    }

    /// Replaces every field from an encoded Rust value.
    ///
    /// # Errors
    ///
    /// [`EcsError::Encode`] if `value` does not serialize, and
    /// [`EcsError::UnknownField`] if it carries fields outside the schema.
    pub fn encode<T: Serialize>(&mut self, value: &T) -> EcsResult<()> {
        let toml::Value::Table(table) = toml::Value::try_from(value)? else {
            return Err(EcsError::InvalidConfig(format!(
                "component {} values must encode to a table",
                self.component_type
            )));
        };
        for (field, v) in table {
            self.set(&field, v)?;
        }
        Ok(())
    }

    /// Shallow overlay: each provided top-level field replaces the current one.
    pub(crate) fn overlay(&mut self, values: &Fields) {
        for (field, value) in values {
            self.fields.insert(field.clone(), value.clone());
        }
    }

    /// Restores the declared defaults and clears the changed flag.
    pub(crate) fn reset(&mut self, defaults: &Fields) {
        self.fields.clone_from(defaults);
        self.changed = false;
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f64,
        y: f64,
    }

    fn position_type() -> ComponentType {
        ComponentType::from_default::<Position>(0, "Position").unwrap()
    }

    #[test]
    fn test_from_default_builds_schema() {
        let ty = position_type();
        assert_eq!(ty.defaults.len(), 2);
        assert_eq!(ty.defaults["y"].as_float(), Some(0.0));
    }

    #[test]
    fn test_from_default_rejects_non_table() {
        let err = ComponentType::from_default::<u32>(1, "Bad").unwrap_err();
        assert!(matches!(err, EcsError::InvalidConfig(_) | EcsError::Encode(_)));
    }

    #[test]
    fn test_check_fields() {
        let ty = position_type();
        let mut ok = Fields::new();
        ok.insert("x".into(), 5.0.into());
        assert!(ty.check_fields(&ok).is_ok());

        let mut bad = Fields::new();
        bad.insert("z".into(), 1.0.into());
        assert!(matches!(
            ty.check_fields(&bad),
            Err(EcsError::UnknownField { field, .. }) if field == "z"
        ));
    }

    #[test]
    fn test_overlay_is_shallow() {
        let mut defaults = Fields::new();
        let mut inner = Fields::new();
        inner.insert("a".into(), 1.into());
        inner.insert("b".into(), 2.into());
        defaults.insert("nested".into(), toml::Value::Table(inner));

        let mut instance = ComponentInstance::new(ComponentTypeId::new(3), defaults);
        let mut patch_inner = Fields::new();
        patch_inner.insert("a".into(), 10.into());
        let mut patch = Fields::new();
        patch.insert("nested".into(), toml::Value::Table(patch_inner));
        instance.overlay(&patch);

        let nested = instance.get("nested").and_then(toml::Value::as_table).unwrap();
        assert_eq!(nested.get("a").and_then(toml::Value::as_integer), Some(10));
        assert!(nested.get("b").is_none()); // Replaced wholesale, not merged
    }

    #[test]
    fn test_decode_encode() {
        let ty = position_type();
        let mut instance = ComponentInstance::new(ty.id, ty.defaults.clone());
        instance.encode(&Position { x: 1.5, y: -2.0 }).unwrap();
        assert_eq!(
            instance.decode::<Position>().unwrap(),
            Position { x: 1.5, y: -2.0 }
        );

        instance.set("x", 4.0).unwrap();
        assert_eq!(instance.get_f64("x"), Some(4.0));
        assert!(instance.set("w", 1.0).is_err());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let ty = position_type();
        let mut instance = ComponentInstance::new(ty.id, ty.defaults.clone());
        instance.set("x", 9.0).unwrap();
        instance.set_changed(true);

        instance.reset(&ty.defaults);
        assert_eq!(instance.fields(), &ty.defaults);
        assert!(!instance.is_changed());
    }
}
