//! # Scene Files
//!
//! A scene is a world manifest plus an initial population:
//!
//! ```toml
//! [[components]]
//! id = 0
//! name = "Position"
//! defaults = { x = 0.0, y = 0.0 }
//!
//! [[entities]]
//! count = 4
//! components.Position = { x = 1.0 }
//! ```
//!
//! Seeding goes through the public API only, so the population appears at
//! the first flush like any other creation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use zerog_core::{EcsError, EcsResult, EntityId, Fields, Game, WorldManifest};

/// One group of identical entities.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EntitySpec {
    /// How many copies to create.
    #[serde(default = "EntitySpec::default_count")]
    pub count: u32,
    /// Component name → initial values (may be empty).
    #[serde(default)]
    pub components: BTreeMap<String, Fields>,
}

impl EntitySpec {
    const fn default_count() -> u32 {
        1
    }
}

/// A parsed scene file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Scene {
    /// Constants, component types and globals.
    #[serde(flatten)]
    pub world: WorldManifest,
    /// Initial population.
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

impl Scene {
    /// Parses a scene from TOML text.
    ///
    /// # Errors
    ///
    /// [`EcsError::Decode`] on malformed input.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a scene file.
    ///
    /// # Errors
    ///
    /// [`EcsError::Io`] or [`EcsError::Decode`].
    pub fn load(path: &Path) -> EcsResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Total number of entities the scene creates.
    pub fn population(&self) -> u64 {
        self.entities.iter().map(|spec| u64::from(spec.count)).sum()
    }

    /// Enqueues the initial population. Nothing is live until the next step.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] for a component name the game does not
    /// know, [`EcsError::IdsExhausted`] if the population does not fit in
    /// the free ids. Both are checked before anything is enqueued.
    pub fn seed(&self, game: &mut Game) -> EcsResult<Vec<EntityId>> {
        let mut resolved = Vec::with_capacity(self.entities.len());
        for spec in &self.entities {
            let mut components = Vec::with_capacity(spec.components.len());
            for (name, values) in &spec.components {
                let id = game.component_type_id(name).ok_or_else(|| {
                    EcsError::InvalidConfig(format!("scene uses unknown component `{name}`"))
                })?;
                let initial = (!values.is_empty()).then(|| values.clone());
                components.push((id, initial));
            }
            resolved.push((spec.count, components));
        }

        let available = game.ids().available() as u64;
        if self.population() > available {
            return Err(EcsError::IdsExhausted {
                max_entities: game.ids().max_entities(),
            });
        }

        let mut ids = Vec::new();
        for (count, components) in resolved {
            for _ in 0..count {
                let id = game.create()?;
                for (component, initial) in &components {
                    game.add(id, *component, initial.clone());
                }
                ids.push(id);
            }
        }
        tracing::info!(entities = ids.len(), "scene seeded");
        Ok(ids)
    }
}
