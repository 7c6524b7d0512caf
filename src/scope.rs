use crate::{
    domain::{Project, User},
    error::ConfigurationError,
};

const GLOBAL: &str = "Global";
const PRIVATE: &str = "Not Shared";
const PROJECT_PREFIX: &str = "Project@@@";

/// Visibility tier of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShareScope {
    /// Visible to every user.
    Global,

    /// Visible to the members of one project.
    Project(Project),

    /// Visible only to the owner of the definition.
    Private,
}

impl ShareScope {
    pub fn is_global(&self) -> bool {
        matches!(self, ShareScope::Global)
    }

    pub fn is_project(&self) -> bool {
        matches!(self, ShareScope::Project(_))
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ShareScope::Private)
    }

    /// Project this scope shares with.
    pub fn project(&self) -> Result<&Project, ConfigurationError> {
        match self {
            ShareScope::Project(project) => Ok(project),
            other => Err(ConfigurationError::NotProjectScoped(other.to_string())),
        }
    }

    /// Whether a definition with this scope, owned by `owner`, can be seen by `user`.
    pub fn is_visible_to(&self, owner: &User, user: &User) -> bool {
        if owner == user {
            return true;
        }
        match self {
            ShareScope::Global => true,
            ShareScope::Project(project) => project.is_member(user),
            ShareScope::Private => false,
        }
    }

    /// Parse the string form produced by [Display](std::fmt::Display).
    /// Project scopes only carry the project name, so the caller provides a lookup
    /// to turn the name back into a project.
    pub fn parse(
        s: &str,
        lookup_project: impl FnOnce(&str) -> Option<Project>,
    ) -> Result<Self, ConfigurationError> {
        match s {
            GLOBAL => Ok(ShareScope::Global),
            PRIVATE => Ok(ShareScope::Private),
            _ => {
                let name = s
                    .strip_prefix(PROJECT_PREFIX)
                    .ok_or_else(|| ConfigurationError::UnknownShareScope(s.to_owned()))?;
                lookup_project(name)
                    .map(ShareScope::Project)
                    .ok_or_else(|| ConfigurationError::UnknownShareScope(s.to_owned()))
            }
        }
    }
}

impl std::fmt::Display for ShareScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareScope::Global => f.write_str(GLOBAL),
            ShareScope::Private => f.write_str(PRIVATE),
            ShareScope::Project(project) => write!(f, "{PROJECT_PREFIX}{}", project.name()),
        }
    }
}
