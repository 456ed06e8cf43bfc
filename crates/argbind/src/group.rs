//! Named collections of parameters or commands.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::parameter::Parameter;

type SortFn = dyn Fn(&Group) -> Option<i64> + Send + Sync;

/// Ordering hint for help panels.
#[derive(Clone)]
pub enum SortKey {
    Value(i64),
    Computed(Arc<SortFn>),
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Computed(a), Self::Computed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A group is immutable once built and shared through `Arc`.
///
/// Equality is structural over name, help, visibility and sort key; the
/// `default_parameter` template does not take part.
#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub help: String,
    pub show: bool,
    pub sort_key: Option<SortKey>,
    default_parameter: Option<Parameter>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            show: true,
            sort_key: None,
            default_parameter: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show = false;
        self
    }

    pub fn with_sort_key(mut self, key: i64) -> Self {
        self.sort_key = Some(SortKey::Value(key));
        self
    }

    pub fn with_sort_key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Group) -> Option<i64> + Send + Sync + 'static,
    {
        self.sort_key = Some(SortKey::Computed(Arc::new(f)));
        self
    }

    /// Attach a configuration template merged into every member parameter.
    ///
    /// The template may not name a group itself: a member's group is what
    /// selects the template in the first place.
    pub fn with_default_parameter(mut self, parameter: Parameter) -> Result<Self> {
        if let Some(group) = &parameter.group {
            return Err(Error::config(format!(
                "default_parameter of group \"{}\" cannot specify a group (got \"{}\")",
                self.name,
                group.name()
            )));
        }
        self.default_parameter = Some(parameter);
        Ok(self)
    }

    pub fn default_parameter(&self) -> Option<&Parameter> {
        self.default_parameter.as_ref()
    }

    /// Evaluated sort key; `None` sorts after every keyed group.
    pub fn sort_value(&self) -> Option<i64> {
        match &self.sort_key {
            None => None,
            Some(SortKey::Value(v)) => Some(*v),
            Some(SortKey::Computed(f)) => f(self),
        }
    }

    pub(crate) fn commands() -> Self {
        Self::new("Commands")
    }

    pub(crate) fn arguments() -> Self {
        Self::new("Arguments")
    }

    pub(crate) fn parameters() -> Self {
        Self::new("Parameters")
    }

    pub(crate) fn session_parameters() -> Self {
        Self::new("Session Parameters")
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.help == other.help
            && self.show == other.show
            && self.sort_key == other.sort_key
    }
}

/// How a parameter or command names its group.
#[derive(Debug, Clone)]
pub enum GroupRef {
    /// Resolved against the groups known at resolution time, or created.
    Name(String),
    Group(Arc<Group>),
}

impl GroupRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Group(group) => &group.name,
        }
    }
}

impl From<&str> for GroupRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for GroupRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Group> for GroupRef {
    fn from(group: Group) -> Self {
        Self::Group(Arc::new(group))
    }
}

impl From<Arc<Group>> for GroupRef {
    fn from(group: Arc<Group>) -> Self {
        Self::Group(group)
    }
}

/// Per-resolution memo mapping group names to one shared handle.
///
/// Explicit handles are registered first, so a later reference by name (or
/// a structurally equal handle) resolves to the first one seen.
#[derive(Debug, Default)]
pub(crate) struct GroupRegistry {
    groups: Vec<Arc<Group>>,
}

impl GroupRegistry {
    pub(crate) fn register(&mut self, group: &Arc<Group>) {
        if !self.groups.iter().any(|g| same_group(g, group)) {
            self.groups.push(Arc::clone(group));
        }
    }

    pub(crate) fn resolve(&mut self, reference: &GroupRef) -> Arc<Group> {
        match reference {
            GroupRef::Group(group) => self
                .groups
                .iter()
                .find(|g| same_group(g, group))
                .cloned()
                .unwrap_or_else(|| {
                    self.groups.push(Arc::clone(group));
                    Arc::clone(group)
                }),
            GroupRef::Name(name) => self.by_name(name),
        }
    }

    fn by_name(&mut self, name: &str) -> Arc<Group> {
        if let Some(existing) = self.groups.iter().find(|g| g.name == name) {
            return Arc::clone(existing);
        }
        let created = Arc::new(Group::new(name));
        self.groups.push(Arc::clone(&created));
        created
    }
}

/// Identity, falling back to structural equality.
pub(crate) fn same_group(a: &Arc<Group>, b: &Arc<Group>) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameter_with_group_is_rejected_at_construction() {
        let err = Group::new("Food")
            .with_default_parameter(Parameter::new().group("Drink"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: default_parameter of group \"Food\" cannot specify a group (got \"Drink\")"
        );
    }

    #[test]
    fn default_parameter_without_group_is_accepted() {
        let group = Group::new("Food")
            .with_default_parameter(Parameter::new().negative_bool("--group-"))
            .unwrap();
        assert_eq!(
            group
                .default_parameter()
                .and_then(|p| p.negative_bool.as_deref()),
            Some("--group-")
        );
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Group::new("A"), Group::new("A"));
        assert_ne!(Group::new("A"), Group::new("A").with_help("x"));
        assert_ne!(Group::new("A"), Group::new("A").hidden());
    }

    #[test]
    fn sort_value_evaluates_callables() {
        assert_eq!(Group::new("B").with_sort_key(5).sort_value(), Some(5));
        assert_eq!(Group::new("A").with_sort_key_fn(|_| Some(10)).sort_value(), Some(10));
        assert_eq!(Group::new("D").with_sort_key_fn(|_| None).sort_value(), None);
        assert_eq!(Group::new("C").sort_value(), None);
    }

    #[test]
    fn registry_memoizes_names() {
        let mut registry = GroupRegistry::default();
        let explicit = Arc::new(Group::new("Food"));
        registry.register(&explicit);

        let by_name = registry.resolve(&GroupRef::from("Food"));
        assert!(Arc::ptr_eq(&by_name, &explicit));

        let created = registry.resolve(&GroupRef::from("Drink"));
        let again = registry.resolve(&GroupRef::from("Drink"));
        assert!(Arc::ptr_eq(&created, &again));

        let twin = registry.resolve(&GroupRef::from(Group::new("Food")));
        assert!(Arc::ptr_eq(&twin, &explicit));
    }
}
