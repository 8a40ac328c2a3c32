use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use super::query::{GroupQuery, GroupsPage};
use super::resource::Resource;
use super::rule::{is_authorized, AccessRule, GroupTable, NewAccessRule};
use super::{validate_group, validate_key_pair, AccessControl, AclError, Group};

/// A key pair together with the rules attached to it, as written in
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,

    #[serde(default)]
    pub rules: Vec<NewAccessRule>,
}

struct KeyEntry {
    private_key: String,
    rules: Vec<AccessRule>,
}

/// Static access control built once from configuration. Everything is
/// validated at construction; the snapshot never changes afterwards.
pub struct ArrayAdapter {
    keys: HashMap<String, KeyEntry>,
    groups: GroupTable,
}

impl ArrayAdapter {
    /// Builds the adapter, failing on the first invalid key pair, rule or
    /// group. Rule ids are assigned sequentially from 1 in the given order.
    pub fn new(key_pairs: Vec<KeyPair>, groups: GroupTable) -> Result<Self, AclError> {
        for (name, resources) in groups.iter() {
            validate_group(name, resources)?;
        }

        let mut keys = HashMap::with_capacity(key_pairs.len());
        let mut next_id = 1;
        for pair in key_pairs {
            validate_key_pair(&pair.public_key, &pair.private_key)?;
            if keys.contains_key(&pair.public_key) {
                return Err(AclError::KeyPairExists(pair.public_key));
            }

            let mut rules = Vec::with_capacity(pair.rules.len());
            for rule in pair.rules {
                rule.validate()?;
                if let Some(group) = rule.group() {
                    if !groups.contains_key(group) {
                        return Err(AclError::GroupNotFound(group.to_string()));
                    }
                }
                rules.push(AccessRule { id: next_id, rule });
                next_id += 1;
            }

            keys.insert(
                pair.public_key,
                KeyEntry {
                    private_key: pair.private_key,
                    rules,
                },
            );
        }

        debug!(
            "Built static access control with {} key pairs and {} groups",
            keys.len(),
            groups.len()
        );
        Ok(Self { keys, groups })
    }

    fn entry(&self, public_key: &str) -> Result<&KeyEntry, AclError> {
        self.keys
            .get(public_key)
            .ok_or_else(|| AclError::PublicKeyNotFound(public_key.to_string()))
    }
}

impl AccessControl for ArrayAdapter {
    fn has_access(
        &self,
        public_key: &str,
        resource: Resource,
        user: Option<&str>,
    ) -> Result<bool, AclError> {
        let entry = match self.keys.get(public_key) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        Ok(is_authorized(
            &entry.rules,
            &self.groups,
            public_key,
            resource,
            user,
        ))
    }

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>, AclError> {
        Ok(self.keys.get(public_key).map(|e| e.private_key.clone()))
    }

    fn public_key_exists(&self, public_key: &str) -> Result<bool, AclError> {
        Ok(self.keys.contains_key(public_key))
    }

    fn get_access_list(&self, public_key: &str) -> Result<Vec<AccessRule>, AclError> {
        Ok(self.entry(public_key)?.rules.clone())
    }

    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>, AclError> {
        let entry = self.entry(public_key)?;
        Ok(entry.rules.iter().find(|r| r.id == id).cloned())
    }

    fn get_groups(&self, query: &GroupQuery) -> Result<GroupsPage, AclError> {
        let groups = self
            .groups
            .iter()
            .map(|(name, resources)| Group {
                name: name.clone(),
                resources: resources.clone(),
            })
            .collect();
        Ok(query.paginate(groups))
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>, AclError> {
        Ok(self.groups.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{RuleResources, RuleUsers};

    fn key_pair(public_key: &str, rules: Vec<NewAccessRule>) -> KeyPair {
        KeyPair {
            public_key: public_key.to_string(),
            private_key: format!("{public_key}-secret"),
            rules,
        }
    }

    fn editors() -> GroupTable {
        GroupTable::from([(
            String::from("editors"),
            BTreeSet::from([Resource::ImageGet, Resource::MetadataPut]),
        )])
    }

    #[test]
    fn test_has_access() {
        let adapter = ArrayAdapter::new(
            vec![
                key_pair(
                    "k",
                    vec![
                        NewAccessRule::for_users(BTreeSet::from([Resource::MetadataPut]), ["alice"])
                            .unwrap(),
                    ],
                ),
                key_pair(
                    "g",
                    vec![NewAccessRule::new(RuleResources::Group("editors".into()), RuleUsers::Any)
                        .unwrap()],
                ),
            ],
            editors(),
        )
        .unwrap();

        assert!(adapter.has_access("k", Resource::MetadataPut, Some("alice")).unwrap());
        assert!(!adapter.has_access("k", Resource::MetadataPut, Some("bob")).unwrap());

        assert!(adapter.has_access("g", Resource::ImageGet, Some("anyone")).unwrap());
        assert!(!adapter.has_access("g", Resource::KeysDelete, Some("anyone")).unwrap());

        for resource in Resource::ALL {
            assert!(!adapter.has_access("unknown", *resource, None).unwrap());
            assert!(!adapter.has_access("unknown", *resource, Some("alice")).unwrap());
        }
    }

    #[test]
    fn test_rule_ids() {
        let rule = NewAccessRule::new(RuleResources::Group("editors".into()), RuleUsers::Any).unwrap();
        let adapter = ArrayAdapter::new(
            vec![
                key_pair("a", vec![rule.clone(), rule.clone()]),
                key_pair("b", vec![rule.clone()]),
            ],
            editors(),
        )
        .unwrap();

        let ids: Vec<_> = adapter.get_access_list("a").unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(adapter.get_access_rule("b", 3).unwrap().unwrap().rule, rule);
        assert!(adapter.get_access_rule("b", 1).unwrap().is_none());
        assert!(matches!(
            adapter.get_access_list("c"),
            Err(AclError::PublicKeyNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let result = ArrayAdapter::new(vec![key_pair("a", vec![]), key_pair("a", vec![])], editors());
        assert!(matches!(result, Err(AclError::KeyPairExists(ref k)) if k == "a"));

        let rule = NewAccessRule::new(RuleResources::Group("missing".into()), RuleUsers::Any).unwrap();
        let result = ArrayAdapter::new(vec![key_pair("a", vec![rule])], editors());
        assert!(matches!(result, Err(AclError::GroupNotFound(ref g)) if g == "missing"));

        let rule = NewAccessRule {
            resources: RuleResources::Resources(BTreeSet::from([Resource::ImageGet])),
            users: RuleUsers::Users(BTreeSet::new()),
        };
        let result = ArrayAdapter::new(vec![key_pair("a", vec![rule])], editors());
        assert!(matches!(result, Err(AclError::InvalidRule(_))));

        let groups = GroupTable::from([(String::from("empty"), BTreeSet::new())]);
        let result = ArrayAdapter::new(vec![], groups);
        assert!(matches!(result, Err(AclError::InvalidRule(_))));

        let mut pair = key_pair("a", vec![]);
        pair.private_key.clear();
        let result = ArrayAdapter::new(vec![pair], editors());
        assert!(matches!(result, Err(AclError::InvalidKeyPair(_))));
    }

    #[test]
    fn test_groups() {
        let mut groups = editors();
        groups.insert(String::from("admins"), BTreeSet::from([Resource::KeysPut]));
        let adapter = ArrayAdapter::new(vec![], groups).unwrap();

        let page = adapter.get_groups(&GroupQuery::new(1, 1).unwrap()).unwrap();
        assert_eq!(page.hits, 2);
        assert_eq!(page.groups[0].name, "admins");

        assert!(adapter.group_exists("editors").unwrap());
        assert!(!adapter.group_exists("viewers").unwrap());
        assert_eq!(
            adapter.get_group("admins").unwrap(),
            Some(BTreeSet::from([Resource::KeysPut]))
        );
    }
}
