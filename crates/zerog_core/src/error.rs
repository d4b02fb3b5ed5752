//! # ECS Error Types
//!
//! Every failure the runtime can surface. Variants are grouped into four
//! kinds (see [`ErrorKind`]) so callers can branch on the category without
//! matching every variant.

use thiserror::Error;

use crate::ecs::{ComponentHandle, ComponentTypeId, EntityId, Operation};

/// Coarse category of an [`EcsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request does not make sense against the current committed state.
    InvalidOperation,
    /// An id space or pool has no room left.
    ResourceExhausted,
    /// The runtime was driven in a way that breaks its own ordering rules.
    InvariantViolation,
    /// Construction-time input (types, manifests) was rejected.
    Configuration,
}

/// Errors that can occur in the ECS runtime.
#[derive(Error, Debug)]
pub enum EcsError {
    /// The entity is not registered in any archetype.
    #[error("entity {0} is not live")]
    EntityNotLive(EntityId),

    /// A `CreateEntity` targeted an id that is already live.
    #[error("entity {0} is already live")]
    EntityAlreadyLive(EntityId),

    /// A `CreateEntity` named an id at or above the configured maximum.
    #[error("entity {entity} is out of range: ids must stay below {max_entities}")]
    EntityOutOfRange {
        /// The rejected id.
        entity: EntityId,
        /// Configured upper bound on entity ids.
        max_entities: u32,
    },

    /// The entity already holds a component of this type.
    #[error("entity {entity} already has component {component}")]
    DuplicateComponent {
        /// Target entity.
        entity: EntityId,
        /// Component type that was added twice.
        component: ComponentTypeId,
    },

    /// The entity does not hold a component of this type.
    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        /// Target entity.
        entity: EntityId,
        /// Component type that was absent.
        component: ComponentTypeId,
    },

    /// No component type is registered under this id.
    #[error("component type {0} is not registered")]
    UnknownComponent(ComponentTypeId),

    /// An initial value or write named a field outside the type's schema.
    #[error("component {component} has no field `{field}`")]
    UnknownField {
        /// Component type whose schema was consulted.
        component: ComponentTypeId,
        /// The rejected field name.
        field: String,
    },

    /// The handle points at a released (or recycled) instance slot.
    #[error("stale component handle {0}")]
    StaleHandle(ComponentHandle),

    /// Every entity id below the configured maximum is in use.
    #[error("entity ids exhausted: all ids below {max_entities} are live")]
    IdsExhausted {
        /// Configured upper bound on entity ids.
        max_entities: u32,
    },

    /// A pool with a hard cap has no room left.
    #[error("pool exhausted: capacity {capacity}")]
    PoolExhausted {
        /// Configured hard cap.
        capacity: usize,
    },

    /// No archetype id is left for a new component combination.
    #[error("archetype ids exhausted")]
    ArchetypesExhausted,

    /// The runtime was re-entered while it was stepping or flushing.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// One or more queued operations failed while flushing.
    ///
    /// Every other queued operation was still applied.
    #[error("{} queued operation(s) failed during flush; first: {}", .failures.len(), first_failure(.failures))]
    Flush {
        /// Failed operations, in the order they were applied.
        failures: Vec<FailedOperation>,
    },

    /// Registry or manifest input was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A manifest or component value could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] toml::de::Error),

    /// A Rust value could not be encoded into a component field table.
    #[error("encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A manifest file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A queued operation together with the reason it was rejected.
#[derive(Debug)]
pub struct FailedOperation {
    /// The operation as it was enqueued.
    pub operation: Operation,
    /// Why applying it failed.
    pub error: EcsError,
}

fn first_failure(failures: &[FailedOperation]) -> String {
    failures
        .first()
        .map_or_else(String::new, |f| f.error.to_string())
}

impl EcsError {
    /// Returns the taxonomy bucket for this error.
    ///
    /// A [`EcsError::Flush`] reports the kind of its first failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityNotLive(_)
            | Self::EntityAlreadyLive(_)
            | Self::EntityOutOfRange { .. }
            | Self::DuplicateComponent { .. }
            | Self::MissingComponent { .. }
            | Self::UnknownComponent(_)
            | Self::UnknownField { .. }
            | Self::StaleHandle(_) => ErrorKind::InvalidOperation,
            Self::IdsExhausted { .. } | Self::PoolExhausted { .. } | Self::ArchetypesExhausted => {
                ErrorKind::ResourceExhausted
            }
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Flush { failures } => failures
                .first()
                .map_or(ErrorKind::InvariantViolation, |f| f.error.kind()),
            Self::InvalidConfig(_) | Self::Decode(_) | Self::Encode(_) | Self::Io(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Failed operations carried by a flush error; empty for every other variant.
    #[must_use]
    pub fn failures(&self) -> &[FailedOperation] {
        match self {
            Self::Flush { failures } => failures,
            _ => &[],
        }
    }
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
