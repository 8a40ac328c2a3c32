use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::{Deserialize, Serialize};

use super::resource::{expand_resource_spec, Resource};
use super::AclError;

/// Group name to member resources, as seen by one rule evaluation.
pub type GroupTable = BTreeMap<String, BTreeSet<Resource>>;

/// The resources an access rule covers.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleResources {
    /// An inline, non-empty resource list.
    Resources(BTreeSet<Resource>),
    /// A reference to a resource group, expanded at evaluation time.
    Group(String),
}

/// The users an access rule applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleUsers {
    /// `"*"`: every user.
    Any,
    /// A non-empty list of user names, compared case-sensitively.
    Users(BTreeSet<String>),
}

impl RuleUsers {
    pub fn matches(&self, user: &str) -> bool {
        match self {
            RuleUsers::Any => true,
            RuleUsers::Users(users) => users.contains(user),
        }
    }
}

/// An access rule that is not attached to a public key yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleRepr", into = "RuleRepr")]
pub struct NewAccessRule {
    pub resources: RuleResources,
    pub users: RuleUsers,
}

/// An access rule attached to a public key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRule {
    pub id: u64,

    #[serde(flatten)]
    pub rule: NewAccessRule,
}

impl NewAccessRule {
    pub fn new(resources: RuleResources, users: RuleUsers) -> Result<Self, AclError> {
        let rule = Self { resources, users };
        rule.validate()?;
        Ok(rule)
    }

    /// A rule granting `resources` to an explicit list of users.
    pub fn for_users<I, S>(resources: BTreeSet<Resource>, users: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users = users.into_iter().map(Into::into).collect();
        Self::new(RuleResources::Resources(resources), RuleUsers::Users(users))
    }

    pub fn validate(&self) -> Result<(), AclError> {
        match &self.resources {
            RuleResources::Resources(resources) if resources.is_empty() => {
                return Err(AclError::InvalidRule(String::from(
                    "rule resources cannot be empty",
                )));
            }
            RuleResources::Group(name) if name.is_empty() => {
                return Err(AclError::InvalidRule(String::from(
                    "rule group name cannot be empty",
                )));
            }
            _ => {}
        }

        if let RuleUsers::Users(users) = &self.users {
            if users.is_empty() {
                return Err(AclError::InvalidRule(String::from(
                    "rule users cannot be an empty list, use \"*\" for every user",
                )));
            }
            if users.iter().any(|u| u.is_empty()) {
                return Err(AclError::InvalidRule(String::from(
                    "rule users cannot contain an empty name",
                )));
            }
        }

        Ok(())
    }

    /// Name of the group this rule references, if any.
    pub fn group(&self) -> Option<&str> {
        match &self.resources {
            RuleResources::Group(name) => Some(name),
            RuleResources::Resources(_) => None,
        }
    }
}

/// Evaluates `rules` for one request. Grants are unioned: the first rule whose
/// users match `user` and whose (expanded) resources contain `resource` grants
/// access.
///
/// `user` defaults to `public_key` when absent, so a key acting on its own
/// resources is matched against rules naming the key itself.
///
/// A matching rule that references a group missing from `groups` denies the
/// whole evaluation.
pub fn is_authorized(
    rules: &[AccessRule],
    groups: &GroupTable,
    public_key: &str,
    resource: Resource,
    user: Option<&str>,
) -> bool {
    let user = user.unwrap_or(public_key);
    for rule in rules.iter() {
        if !rule.rule.users.matches(user) {
            continue;
        }

        let covered = match &rule.rule.resources {
            RuleResources::Resources(resources) => resources.contains(&resource),
            RuleResources::Group(name) => match groups.get(name) {
                Some(resources) => resources.contains(&resource),
                None => {
                    warn!(
                        "Access rule {} of '{public_key}' references unknown group '{name}', denying",
                        rule.id
                    );
                    return false;
                }
            },
        };
        if covered {
            return true;
        }
    }
    false
}

#[derive(Serialize, Deserialize)]
struct RuleRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resources: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,

    users: UsersRepr,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum UsersRepr {
    Wildcard(String),
    Users(Vec<String>),
}

impl TryFrom<RuleRepr> for NewAccessRule {
    type Error = AclError;

    fn try_from(repr: RuleRepr) -> Result<Self, Self::Error> {
        let resources = match (repr.resources, repr.group) {
            (Some(_), Some(_)) => {
                return Err(AclError::InvalidRule(String::from(
                    "rule cannot have both resources and group",
                )));
            }
            (None, None) => {
                return Err(AclError::InvalidRule(String::from(
                    "rule needs either resources or group",
                )));
            }
            (Some(specs), None) => {
                let mut resources = BTreeSet::new();
                for spec in specs.iter() {
                    resources.extend(expand_resource_spec(spec)?);
                }
                RuleResources::Resources(resources)
            }
            (None, Some(group)) => RuleResources::Group(group),
        };

        let users = match repr.users {
            UsersRepr::Wildcard(s) if s == "*" => RuleUsers::Any,
            UsersRepr::Wildcard(s) => {
                return Err(AclError::InvalidRule(format!(
                    "rule users must be \"*\" or a list, found '{s}'"
                )));
            }
            UsersRepr::Users(users) => RuleUsers::Users(users.into_iter().collect()),
        };

        Self::new(resources, users)
    }
}

impl From<NewAccessRule> for RuleRepr {
    fn from(rule: NewAccessRule) -> Self {
        let (resources, group) = match rule.resources {
            RuleResources::Resources(resources) => (
                Some(resources.iter().map(|r| r.to_string()).collect()),
                None,
            ),
            RuleResources::Group(group) => (None, Some(group)),
        };
        let users = match rule.users {
            RuleUsers::Any => UsersRepr::Wildcard(String::from("*")),
            RuleUsers::Users(users) => UsersRepr::Users(users.into_iter().collect()),
        };
        RuleRepr {
            resources,
            group,
            users,
        }
    }
}
