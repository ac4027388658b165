//! Coordinate resolution through the colony → world → system chain.

use crate::fetch::UniverseFetcher;
use crate::{SyncEngine, SyncError, SyncWarning};
use abs_core::records::{Entity, Located, RecordKey, SystemRecord, WorldRecord, WormholeRecord};
use abs_core::schema::EntityKind;
use abs_storage::RecordStore;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Link of the resolution chain a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStep {
    World,
    System,
    TargetSystem,
}

impl fmt::Display for LocationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::World => "world",
            Self::System => "system",
            Self::TargetSystem => "target system",
        })
    }
}

impl<F: UniverseFetcher> SyncEngine<F> {
    /// Cached system, or the game's copy which is then cached.
    pub fn system_info(
        &self,
        store: &RecordStore,
        key: &RecordKey,
    ) -> Result<Option<SystemRecord>, SyncError> {
        if let Some(Entity::System(system)) = store.get(EntityKind::System, key)? {
            return Ok(Some(system));
        }

        let Some(system) = self.fetcher.fetch_system(key)? else {
            debug!(system = %key, "system not disclosed");
            return Ok(None);
        };
        store.update_if_changed(&Entity::System(system.clone()))?;
        debug!(system = %key, "cached fetched system");
        Ok(Some(system))
    }

    /// Cached world, or the game's copy. Either way a world without
    /// coordinates takes its system's and the result is cached.
    pub fn world_info(
        &self,
        store: &RecordStore,
        key: &RecordKey,
    ) -> Result<Option<WorldRecord>, SyncError> {
        let (mut world, cached) = match store.get(EntityKind::World, key)? {
            Some(Entity::World(world)) => (world, true),
            _ => match self.fetcher.fetch_world(key)? {
                Some(world) => (world, false),
                None => {
                    debug!(world = %key, "world not disclosed");
                    return Ok(None);
                }
            },
        };

        let mut placed = false;
        if world.position().is_none() {
            if let Some(system_key) = world.system.clone() {
                if let Some(at) = self
                    .system_info(store, &system_key)?
                    .and_then(|system| system.position())
                {
                    world.set_position(at);
                    placed = true;
                }
            }
        }

        if !cached || placed {
            store.update_if_changed(&Entity::World(world.clone()))?;
            debug!(world = %key, placed, "cached world");
        }
        Ok(Some(world))
    }

    /// Fills in missing coordinates and location references.
    ///
    /// Fleets and signatures walk colony → world → system; colonies start from
    /// their own stored record; wormholes take both ends from their systems.
    pub fn resolve_location(
        &self,
        store: &RecordStore,
        entity: &mut Entity,
    ) -> Result<Vec<SyncWarning>, SyncError> {
        let kind = entity.kind();
        let key = entity.key().clone();
        let mut warnings = Vec::new();

        if let Entity::Wormhole(wormhole) = entity {
            self.resolve_wormhole(store, wormhole, &key, &mut warnings)?;
            return Ok(warnings);
        }

        let own_colony = (kind == EntityKind::Colony).then(|| key.clone());
        let Some(located) = entity.as_located_mut() else {
            return Ok(warnings);
        };
        let resolved = self.resolve_chain(
            store,
            located,
            Target { kind, key: &key },
            own_colony.as_ref(),
            &mut warnings,
        )?;

        if !resolved && kind != EntityKind::Colony {
            warn!(kind = %kind, key = %key, "location unresolved");
            warnings.push(SyncWarning::UnresolvedLocation { kind, key });
        }
        Ok(warnings)
    }

    fn resolve_chain(
        &self,
        store: &RecordStore,
        located: &mut dyn Located,
        target: Target<'_>,
        own_colony: Option<&RecordKey>,
        warnings: &mut Vec<SyncWarning>,
    ) -> Result<bool, SyncError> {
        if located.position().is_some() {
            return Ok(true);
        }

        let colony_key = own_colony.or(located.colony_ref()).cloned();
        if let Some(colony_key) = colony_key {
            if let Some(Entity::Colony(colony)) = store.get(EntityKind::Colony, &colony_key)? {
                // A colony's own observation keeps the references it arrived with.
                let overwrite = own_colony.is_none();
                if let Some(world) = colony.world.clone() {
                    if overwrite || located.world_ref().is_none() {
                        located.set_world_ref(world);
                    }
                }
                if let Some(system) = colony.system.clone() {
                    if overwrite || located.system_ref().is_none() {
                        located.set_system_ref(system);
                    }
                }
                if let Some(at) = Located::position(&colony) {
                    located.set_position(at);
                    return Ok(true);
                }
            }
        }

        if let Some(world_key) = located.world_ref().cloned() {
            let world = target.step(
                LocationStep::World,
                self.world_info(store, &world_key),
                warnings,
            )?;
            if let Some(world) = world {
                if let Some(system) = world.system.clone() {
                    located.set_system_ref(system);
                }
                if let Some(at) = world.position() {
                    located.set_position(at);
                    return Ok(true);
                }
            }
        }

        if let Some(system_key) = located.system_ref().cloned() {
            let system = target.step(
                LocationStep::System,
                self.system_info(store, &system_key),
                warnings,
            )?;
            if let Some(at) = system.and_then(|system| system.position()) {
                located.set_position(at);
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn resolve_wormhole(
        &self,
        store: &RecordStore,
        wormhole: &mut WormholeRecord,
        key: &RecordKey,
        warnings: &mut Vec<SyncWarning>,
    ) -> Result<(), SyncError> {
        let target = Target {
            kind: EntityKind::Wormhole,
            key,
        };

        if wormhole.position().is_none() {
            if let Some(system_key) = wormhole.system.clone() {
                let system = target.step(
                    LocationStep::System,
                    self.system_info(store, &system_key),
                    warnings,
                )?;
                if let Some(at) = system.and_then(|system| system.position()) {
                    wormhole.set_position(at);
                }
            }
        }

        if wormhole.target_position().is_none() {
            if let Some(system_key) = wormhole.target_system.clone() {
                let system = target.step(
                    LocationStep::TargetSystem,
                    self.system_info(store, &system_key),
                    warnings,
                )?;
                if let Some(at) = system.and_then(|system| system.position()) {
                    wormhole.set_target_position(at);
                }
            }
        }
        Ok(())
    }
}

/// The record being resolved, for warnings.
#[derive(Clone, Copy)]
struct Target<'a> {
    kind: EntityKind,
    key: &'a RecordKey,
}

impl Target<'_> {
    /// Turns a fetch failure into a warning so the next step still runs.
    fn step<T>(
        self,
        step: LocationStep,
        result: Result<Option<T>, SyncError>,
        warnings: &mut Vec<SyncWarning>,
    ) -> Result<Option<T>, SyncError> {
        match result {
            Err(SyncError::Fetch(err)) => {
                warn!(kind = %self.kind, key = %self.key, %step, error = %err, "lookup failed");
                warnings.push(SyncWarning::FetchFailed {
                    kind: self.kind,
                    key: self.key.clone(),
                    step,
                    message: err.to_string(),
                });
                Ok(None)
            }
            other => other,
        }
    }
}
