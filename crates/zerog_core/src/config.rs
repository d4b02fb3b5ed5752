//! # Game Configuration
//!
//! A [`GameConfig`] is built in code or from a TOML [`WorldManifest`]:
//!
//! ```toml
//! [constants]
//! max_entities = 4096
//! max_component_id = 64
//!
//! [[components]]
//! id = 0
//! name = "Position"
//! defaults = { x = 0.0, y = 0.0 }
//!
//! [globals]
//! gravity = 9.8
//! ```
//!
//! Systems cannot be described in a manifest; attach them with
//! [`GameConfig::with_system`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::ComponentType;
use crate::error::{EcsError, EcsResult};
use crate::game::Game;

/// Game-wide key/value state shared by systems.
pub type Globals = toml::Table;

/// Undoes whatever a system set up. Run when the game is dropped.
pub type SystemCleanup = Box<dyn FnOnce(&mut Game) + Send + Sync>;

/// Installs a system: subscribes to events, registers queries.
pub type SystemFactory = Box<dyn FnOnce(&mut Game) -> EcsResult<SystemCleanup> + Send + Sync>;

/// Fixed bounds of the id spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConstants {
    /// Component type ids must be below this.
    pub max_component_id: u16,
    /// Entity ids must be below this.
    pub max_entities: u32,
}

impl Default for GameConstants {
    fn default() -> Self {
        Self {
            max_component_id: 256,
            max_entities: 65_536,
        }
    }
}

impl GameConstants {
    /// Rejects bounds that leave no usable id.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if either bound is too small.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_entities < 2 {
            return Err(EcsError::InvalidConfig(format!(
                "max_entities must be at least 2 (id 0 is reserved), got {}",
                self.max_entities
            )));
        }
        if self.max_component_id == 0 {
            return Err(EcsError::InvalidConfig(
                "max_component_id must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Serializable part of a game's configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldManifest {
    /// Id-space bounds.
    #[serde(default)]
    pub constants: GameConstants,
    /// Component types to register.
    #[serde(default)]
    pub components: Vec<ComponentType>,
    /// Initial globals.
    #[serde(default)]
    pub globals: Globals,
}

impl WorldManifest {
    /// Parses a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// [`EcsError::Decode`] on malformed input.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// [`EcsError::Io`] if the file cannot be read, [`EcsError::Decode`] on
    /// malformed input.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Serializes the manifest back to TOML.
    ///
    /// # Errors
    ///
    /// [`EcsError::Encode`] if a value cannot be represented.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Everything needed to construct a [`Game`].
#[derive(Default)]
pub struct GameConfig {
    /// Id-space bounds.
    pub constants: GameConstants,
    /// Component types, registered once at construction.
    pub components: Vec<ComponentType>,
    /// Installed in order at construction.
    pub systems: Vec<SystemFactory>,
    /// Initial globals.
    pub globals: Globals,
}

impl GameConfig {
    /// Creates an empty config with default constants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a parsed manifest.
    #[must_use]
    pub fn from_manifest(manifest: WorldManifest) -> Self {
        Self {
            constants: manifest.constants,
            components: manifest.components,
            systems: Vec::new(),
            globals: manifest.globals,
        }
    }

    /// Replaces the id-space bounds.
    #[must_use]
    pub fn with_constants(mut self, constants: GameConstants) -> Self {
        self.constants = constants;
        self
    }

    /// Adds a component type.
    #[must_use]
    pub fn with_component(mut self, component: ComponentType) -> Self {
        self.components.push(component);
        self
    }

    /// Adds a system factory.
    #[must_use]
    pub fn with_system<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&mut Game) -> EcsResult<SystemCleanup> + Send + Sync + 'static,
    {
        self.systems.push(Box::new(factory));
        self
    }

    /// Sets an initial global.
    #[must_use]
    pub fn with_global(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.globals.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for GameConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameConfig")
            .field("constants", &self.constants)
            .field("components", &self.components)
            .field("systems", &self.systems.len())
            .field("globals", &self.globals)
            .finish()
    }
}
