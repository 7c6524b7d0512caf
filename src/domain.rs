use lazy_regex::regex_is_match;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid item name: {0}")]
pub struct InvalidItemName(String);

/// Name of a definition, a variable, or a call target.
///
/// Names start with a letter or an underscore and contain only ASCII
/// alphanumerics and underscores, up to 64 characters.
#[derive(Clone, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ItemName(String);

impl ItemName {
    pub fn new(name: String) -> Result<Self, InvalidItemName> {
        if regex_is_match!(r"^[a-zA-Z_][a-zA-Z0-9_]{0,63}$", &name) {
            Ok(Self(name))
        } else {
            Err(InvalidItemName(name))
        }
    }

    /// Name that is known to be valid, such as a built-in function name.
    pub(crate) fn trusted(name: &str) -> Self {
        debug_assert!(Self::new(name.to_owned()).is_ok(), "invalid item name {name}");
        Self(name.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ItemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for ItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ItemName {
    type Err = InvalidItemName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemName::new(s.to_string())
    }
}

impl TryFrom<&str> for ItemName {
    type Error = InvalidItemName;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ItemName::new(s.to_string())
    }
}

impl std::borrow::Borrow<str> for ItemName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for ItemName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: AsRef<str>> std::cmp::PartialEq<T> for ItemName {
    fn eq(&self, other: &T) -> bool {
        self.0 == other.as_ref()
    }
}

/// User identity. Users are identified by their e-mail address, which is also
/// the primary partition key of the definition repository.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(transparent)]
pub struct User(String);

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn email(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A project that telemetry is computed for, and that definitions can be
/// shared with.
///
/// Two projects are the same project when both their names and owners match.
/// The member list does not take part in identity.
#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    owner: User,
    members: Vec<User>,
}

impl Project {
    pub fn new(name: impl Into<String>, owner: User) -> Self {
        Self {
            name: name.into(),
            owner,
            members: Vec::new(),
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = User>) -> Self {
        self.members.extend(members);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &User {
        &self.owner
    }

    pub fn members(&self) -> &[User] {
        &self.members
    }

    /// Whether the user participates in the project. The owner always does.
    pub fn is_member(&self, user: &User) -> bool {
        self.owner == *user || self.members.contains(user)
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.owner == other.owner
    }
}

impl Eq for Project {}

impl std::hash::Hash for Project {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.owner.hash(state);
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_name_validation() {
        assert!(ItemName::try_from("ActiveTime").is_ok());
        assert!(ItemName::try_from("_x").is_ok());
        assert!(ItemName::try_from("a").is_ok());
        assert!(ItemName::try_from("1abc").is_err());
        assert!(ItemName::try_from("has-dash").is_err());
        assert!(ItemName::try_from("").is_err());
        assert!(ItemName::new("a".repeat(65)).is_err());
    }

    #[test]
    fn project_membership() {
        let owner = User::new("owner@example.com");
        let member = User::new("member@example.com");
        let stranger = User::new("stranger@example.com");
        let project = Project::new("Default", owner.clone()).with_members([member.clone()]);

        assert!(project.is_member(&owner));
        assert!(project.is_member(&member));
        assert!(!project.is_member(&stranger));
    }

    #[test]
    fn project_identity_ignores_members() {
        let owner = User::new("owner@example.com");
        let a = Project::new("Default", owner.clone());
        let b = Project::new("Default", owner.clone()).with_members([User::new("x@example.com")]);
        let c = Project::new("Other", owner);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
