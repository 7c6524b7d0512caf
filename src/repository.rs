use std::{collections::BTreeMap, sync::Arc};

use log::trace;

use crate::{
    definition::{DefinitionKind, TelemetryDefinition},
    domain::{ItemName, User},
    error::ConfigurationError,
    scope::ShareScope,
};

/// In-memory store of the definitions of one kind, keyed by owner and then
/// by name.
///
/// The repository is not synchronized; [DefinitionManager](crate::manager::DefinitionManager)
/// provides the locking. Owners are kept ordered so scans over shared
/// definitions are deterministic.
#[derive(Debug)]
pub struct DefinitionRepository {
    kind: DefinitionKind,
    owners: BTreeMap<User, BTreeMap<ItemName, Arc<TelemetryDefinition>>>,
}

impl DefinitionRepository {
    pub fn new(kind: DefinitionKind) -> Self {
        Self {
            kind,
            owners: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DefinitionKind {
        self.kind
    }

    /// Store a definition. Fails if its owner already has one with the same name.
    pub fn add(&mut self, definition: Arc<TelemetryDefinition>) -> Result<(), ConfigurationError> {
        debug_assert_eq!(definition.kind(), self.kind);

        let owned = self.owners.entry(definition.owner().clone()).or_default();
        if owned.contains_key(definition.name()) {
            return Err(ConfigurationError::DuplicateForOwner {
                name: definition.name().to_string(),
                owner: definition.owner().to_string(),
            });
        }

        trace!(
            "Adding {} definition `{}` for `{}`",
            self.kind,
            definition.name(),
            definition.owner()
        );
        owned.insert(definition.name().clone(), definition);
        Ok(())
    }

    /// Find a definition by name. The owner's own definitions take precedence.
    /// With `include_shared`, definitions of other owners that are visible to
    /// `owner` are considered as well, and a project shared one is preferred
    /// over a globally shared one.
    pub fn find(
        &self,
        owner: &User,
        name: &str,
        include_shared: bool,
    ) -> Option<&Arc<TelemetryDefinition>> {
        if let Some(own) = self.owners.get(owner).and_then(|owned| owned.get(name)) {
            return Some(own);
        }
        if !include_shared {
            return None;
        }

        let mut global = None;
        for (def_owner, owned) in &self.owners {
            if def_owner == owner {
                continue;
            }
            let Some(definition) = owned.get(name) else {
                continue;
            };
            if !definition.share_scope().is_visible_to(def_owner, owner) {
                continue;
            }
            match definition.share_scope() {
                ShareScope::Project(_) => return Some(definition),
                ShareScope::Global => {
                    global.get_or_insert(definition);
                }
                ShareScope::Private => {}
            }
        }
        global
    }

    /// All definitions visible to the owner: their own, followed by shared ones
    /// when `include_shared` is set.
    pub fn find_all(&self, owner: &User, include_shared: bool) -> Vec<&Arc<TelemetryDefinition>> {
        let mut found: Vec<_> = self
            .owners
            .get(owner)
            .map(|owned| owned.values().collect())
            .unwrap_or_default();

        if include_shared {
            found.extend(
                self.owners
                    .iter()
                    .filter(|(def_owner, _)| *def_owner != owner)
                    .flat_map(|(def_owner, owned)| {
                        owned
                            .values()
                            .filter(move |d| d.share_scope().is_visible_to(def_owner, owner))
                    }),
            );
        }
        found
    }

    /// Remove the owner's definition. Definitions of other owners are never
    /// touched, even when shared with `owner`.
    pub fn remove(&mut self, owner: &User, name: &str) -> Option<Arc<TelemetryDefinition>> {
        let owned = self.owners.get_mut(owner)?;
        let removed = owned.remove(name);
        if owned.is_empty() {
            self.owners.remove(owner);
        }
        removed
    }

    /// Definition of any owner carrying the name.
    pub fn exists(&self, name: &str) -> Option<&Arc<TelemetryDefinition>> {
        self.owners.values().find_map(|owned| owned.get(name))
    }

    pub fn len(&self) -> usize {
        self.owners.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
