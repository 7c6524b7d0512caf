use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::{
    config::EngineConfig,
    definition::{DefinitionKind, TelemetryDefinition},
    domain::User,
    error::ConfigurationError,
    loader::{DefinitionDir, LoadError},
    parse,
    repository::DefinitionRepository,
    scope::ShareScope,
};

/// Source text of the definitions bundled with the engine.
pub fn builtin_definitions() -> &'static str {
    include_str!("builtin/builtin.telemetry")
}

/// One repository per definition kind.
#[derive(Debug)]
struct Repositories([DefinitionRepository; 4]);

impl Repositories {
    fn new() -> Self {
        Self(DefinitionKind::ALL.map(DefinitionRepository::new))
    }

    fn get(&self, kind: DefinitionKind) -> &DefinitionRepository {
        &self.0[kind as usize]
    }

    fn get_mut(&mut self, kind: DefinitionKind) -> &mut DefinitionRepository {
        &mut self.0[kind as usize]
    }

    /// Fail if any definition of any kind already carries the name of `new`.
    fn check_name(&self, new: &TelemetryDefinition) -> Result<(), ConfigurationError> {
        let taken = self.0.iter().find_map(|repo| repo.exists(new.name()));
        match taken {
            None => Ok(()),
            Some(existing) if existing.owner() == new.owner() && existing.kind() == new.kind() => {
                Err(ConfigurationError::DuplicateForOwner {
                    name: new.name().to_string(),
                    owner: new.owner().to_string(),
                })
            }
            Some(existing) => Err(ConfigurationError::NameTaken {
                name: new.name().to_string(),
                kind: existing.kind(),
                owner: existing.owner().to_string(),
            }),
        }
    }

    fn len(&self) -> usize {
        self.0.iter().map(DefinitionRepository::len).sum()
    }
}

/// Registry of telemetry definitions of all kinds sharing one name space.
///
/// The manager is shared between concurrent evaluations, so every access goes
/// through one lock. A manager linked to another one (usually the persistent
/// manager built from [EngineConfig]) also sees the linked definitions, and
/// cannot register names the linked manager already uses. The linked
/// manager's lock is always taken before our own.
#[derive(Debug)]
pub struct DefinitionManager {
    repositories: RwLock<Repositories>,
    link: Option<Arc<DefinitionManager>>,
}

impl DefinitionManager {
    /// Manager holding the bundled definitions and those of the configured
    /// definitions directory. Definitions that fail to parse or register are
    /// logged and skipped.
    pub fn persistent(config: &EngineConfig) -> Result<Arc<Self>, LoadError> {
        let manager = Self::non_persistent(None);
        let owner = &config.system_owner;

        if config.load_builtin {
            manager.load_source(owner, builtin_definitions(), "built-in definitions");
        }
        if let Some(path) = &config.definitions_dir {
            let dir = DefinitionDir::load_dir(path)?;
            for file in dir.files() {
                manager.load_source(owner, &file.source, &file.path.display().to_string());
            }
        }

        debug!("Persistent manager holds {} definition(s)", manager.len());
        Ok(Arc::new(manager))
    }

    /// Empty manager, optionally linked to another one.
    pub fn non_persistent(link: Option<Arc<DefinitionManager>>) -> Self {
        Self {
            repositories: RwLock::new(Repositories::new()),
            link,
        }
    }

    pub fn link(&self) -> Option<&Arc<DefinitionManager>> {
        self.link.as_ref()
    }

    /// Register every definition of `source` globally for `owner`, logging and
    /// skipping the ones that fail.
    fn load_source(&self, owner: &User, source: &str, origin: &str) {
        let mut loaded = 0;
        for result in self.add_sources(owner, &ShareScope::Global, source) {
            match result {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Skipping definition from {origin}: {e}"),
            }
        }
        debug!("Loaded {loaded} definition(s) from {origin}");
    }

    /// Definition visible to `user` under `name`. The linked manager is
    /// consulted first.
    pub fn get(
        &self,
        user: &User,
        name: &str,
        include_shared: bool,
        kind: DefinitionKind,
    ) -> Option<Arc<TelemetryDefinition>> {
        if let Some(found) = self
            .link
            .as_ref()
            .and_then(|link| link.get(user, name, include_shared, kind))
        {
            return Some(found);
        }
        self.repositories
            .read()
            .get(kind)
            .find(user, name, include_shared)
            .cloned()
    }

    /// All definitions of the kind visible to `user`, the linked ones first.
    pub fn get_all(
        &self,
        user: &User,
        include_shared: bool,
        kind: DefinitionKind,
    ) -> Vec<Arc<TelemetryDefinition>> {
        let mut all = self
            .link
            .as_ref()
            .map(|link| link.get_all(user, include_shared, kind))
            .unwrap_or_default();
        all.extend(
            self.repositories
                .read()
                .get(kind)
                .find_all(user, include_shared)
                .into_iter()
                .cloned(),
        );
        all
    }

    /// Register a definition. Its name must not be used by any definition of
    /// any kind and owner, here or in the linked manager.
    pub fn add(
        &self,
        definition: TelemetryDefinition,
    ) -> Result<Arc<TelemetryDefinition>, ConfigurationError> {
        let linked = self.link.as_ref().map(|link| link.repositories.read());
        let mut repositories = self.repositories.write();

        if let Some(linked) = &linked {
            linked.check_name(&definition)?;
        }
        repositories.check_name(&definition)?;

        let definition = Arc::new(definition);
        repositories
            .get_mut(definition.kind())
            .add(definition.clone())?;
        debug!(
            "Added {} definition `{}` of `{}` ({})",
            definition.kind(),
            definition.name(),
            definition.owner(),
            definition.share_scope()
        );
        Ok(definition)
    }

    /// Parse a single definition and register it.
    pub fn add_source(
        &self,
        owner: &User,
        scope: &ShareScope,
        source: &str,
    ) -> Result<Arc<TelemetryDefinition>, ConfigurationError> {
        let definition = TelemetryDefinition::parse(owner.clone(), scope.clone(), source)?;
        self.add(definition)
    }

    /// Parse every definition of `source` and register them one by one. Each
    /// definition keeps its own slice of the text as its source. A failure
    /// does not prevent the following definitions from being registered.
    pub fn add_sources(
        &self,
        owner: &User,
        scope: &ShareScope,
        source: &str,
    ) -> Vec<Result<Arc<TelemetryDefinition>, ConfigurationError>> {
        parse::parse_definitions(source)
            .into_iter()
            .map(|parsed| {
                let (ast, span) = parsed?.split();
                let definition = TelemetryDefinition::new(
                    owner.clone(),
                    scope.clone(),
                    span.slice(source).to_owned(),
                    ast,
                )?;
                self.add(definition)
            })
            .collect()
    }

    /// Remove the definition `user` owns. Definitions of the linked manager
    /// are never removed through this one.
    pub fn remove(
        &self,
        user: &User,
        name: &str,
        kind: DefinitionKind,
    ) -> Option<Arc<TelemetryDefinition>> {
        let removed = self.repositories.write().get_mut(kind).remove(user, name);
        if removed.is_some() {
            debug!("Removed {kind} definition `{name}` of `{user}`");
        }
        removed
    }

    /// Number of definitions held by this manager, not counting linked ones.
    pub fn len(&self) -> usize {
        self.repositories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
