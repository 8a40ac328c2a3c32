use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use super::AclError;

/// The privilege class a resource belongs to. Every resource belongs to exactly
/// one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// Reads of images, metadata, short urls and user info.
    ReadOnly,
    /// Writes and deletes of images, metadata and short urls.
    ReadWrite,
    /// Key pair, access rule and group administration, plus stats.
    Admin,
}

macro_rules! resources {
    ($($variant:ident => $name:literal, $class:ident;)*) => {
        /// One authorizable operation: an HTTP method applied to a kind of
        /// sub-resource. The catalog is closed; resources are never created at
        /// runtime.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Resource {
            $($variant,)*
        }

        impl Resource {
            /// Every resource in the catalog, in declaration order.
            pub const ALL: &'static [Resource] = &[$(Resource::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Resource::$variant => $name,)*
                }
            }

            pub fn class(&self) -> ResourceClass {
                match self {
                    $(Resource::$variant => ResourceClass::$class,)*
                }
            }
        }

        impl FromStr for Resource {
            type Err = AclError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Resource::$variant),)*
                    _ => Err(AclError::UnknownResource(s.to_string())),
                }
            }
        }
    };
}

resources! {
    IndexGet => "index.get", ReadOnly;
    IndexHead => "index.head", ReadOnly;

    StatusGet => "status.get", ReadOnly;
    StatusHead => "status.head", ReadOnly;

    UserGet => "user.get", ReadOnly;
    UserHead => "user.head", ReadOnly;
    UserOptions => "user.options", ReadOnly;

    ImagesGet => "images.get", ReadOnly;
    ImagesHead => "images.head", ReadOnly;
    ImagesOptions => "images.options", ReadOnly;
    ImagesPost => "images.post", ReadWrite;

    GlobalImagesGet => "globalimages.get", ReadOnly;
    GlobalImagesHead => "globalimages.head", ReadOnly;
    GlobalImagesOptions => "globalimages.options", ReadOnly;

    ImageGet => "image.get", ReadOnly;
    ImageHead => "image.head", ReadOnly;
    ImageOptions => "image.options", ReadOnly;
    ImageDelete => "image.delete", ReadWrite;

    MetadataGet => "metadata.get", ReadOnly;
    MetadataHead => "metadata.head", ReadOnly;
    MetadataOptions => "metadata.options", ReadOnly;
    MetadataPut => "metadata.put", ReadWrite;
    MetadataPost => "metadata.post", ReadWrite;
    MetadataDelete => "metadata.delete", ReadWrite;

    ShortUrlGet => "shorturl.get", ReadOnly;
    ShortUrlHead => "shorturl.head", ReadOnly;
    ShortUrlOptions => "shorturl.options", ReadOnly;
    ShortUrlDelete => "shorturl.delete", ReadWrite;

    GlobalShortUrlGet => "globalshorturl.get", ReadOnly;
    GlobalShortUrlHead => "globalshorturl.head", ReadOnly;

    ShortUrlsOptions => "shorturls.options", ReadOnly;
    ShortUrlsPost => "shorturls.post", ReadWrite;
    ShortUrlsDelete => "shorturls.delete", ReadWrite;

    StatsGet => "stats.get", Admin;
    StatsHead => "stats.head", Admin;

    KeysPut => "keys.put", Admin;
    KeysHead => "keys.head", Admin;
    KeysDelete => "keys.delete", Admin;
    KeysOptions => "keys.options", Admin;

    AccessRulesGet => "accessrules.get", Admin;
    AccessRulesHead => "accessrules.head", Admin;
    AccessRulesOptions => "accessrules.options", Admin;

    AccessRuleGet => "accessrule.get", Admin;
    AccessRuleHead => "accessrule.head", Admin;
    AccessRuleDelete => "accessrule.delete", Admin;
    AccessRuleOptions => "accessrule.options", Admin;
    AccessRulePost => "accessrule.post", Admin;

    GroupsGet => "groups.get", Admin;
    GroupsHead => "groups.head", Admin;
    GroupsOptions => "groups.options", Admin;

    GroupGet => "group.get", Admin;
    GroupHead => "group.head", Admin;
    GroupPut => "group.put", Admin;
    GroupDelete => "group.delete", Admin;
    GroupOptions => "group.options", Admin;
}

/// Resources that only read data.
pub fn read_only_resources() -> BTreeSet<Resource> {
    Resource::ALL
        .iter()
        .copied()
        .filter(|r| r.class() == ResourceClass::ReadOnly)
        .collect()
}

/// Read-only resources plus writes and deletes of images, metadata and short
/// urls. Administrative resources are excluded.
pub fn read_write_resources() -> BTreeSet<Resource> {
    Resource::ALL
        .iter()
        .copied()
        .filter(|r| r.class() != ResourceClass::Admin)
        .collect()
}

/// Every resource, including key pair, access rule and group administration.
pub fn all_resources() -> BTreeSet<Resource> {
    Resource::ALL.iter().copied().collect()
}

/// Expands one configuration entry into resources. Besides single resource
/// names the shorthands `read-only`, `read-write` and `all` are accepted.
pub fn expand_resource_spec(spec: &str) -> Result<BTreeSet<Resource>, AclError> {
    match spec {
        "read-only" => Ok(read_only_resources()),
        "read-write" => Ok(read_write_resources()),
        "all" => Ok(all_resources()),
        name => {
            let resource = name.parse()?;
            Ok(BTreeSet::from([resource]))
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sets_are_nested() {
        let read_only = read_only_resources();
        let read_write = read_write_resources();
        let all = all_resources();

        for r in read_only.iter() {
            assert!(read_write.contains(r), "{r} missing from read-write");
            assert!(all.contains(r), "{r} missing from all");
        }
        assert!(read_write.is_subset(&all));

        assert!(read_only.len() < read_write.len());
        assert!(read_write.len() < all.len());
    }

    #[test]
    fn test_classes() {
        assert!(read_only_resources().contains(&Resource::ImageGet));
        assert!(!read_only_resources().contains(&Resource::ImageDelete));
        assert!(read_write_resources().contains(&Resource::MetadataPut));
        assert!(!read_write_resources().contains(&Resource::AccessRulePost));
        assert!(!read_write_resources().contains(&Resource::KeysDelete));
        assert!(all_resources().contains(&Resource::AccessRulePost));
    }

    #[test]
    fn test_names() {
        for r in Resource::ALL {
            let parsed: Resource = r.as_str().parse().unwrap();
            assert_eq!(parsed, *r);
        }
        assert_eq!(Resource::AccessRulePost.to_string(), "accessrule.post");
        assert!(matches!(
            "image.patch".parse::<Resource>(),
            Err(AclError::UnknownResource(_))
        ));
    }

    #[test]
    fn test_expand_resource_spec() {
        assert_eq!(expand_resource_spec("all").unwrap().len(), Resource::ALL.len());
        assert_eq!(
            expand_resource_spec("read-write").unwrap(),
            read_write_resources()
        );
        assert_eq!(
            expand_resource_spec("metadata.put").unwrap(),
            BTreeSet::from([Resource::MetadataPut])
        );
        assert!(expand_resource_spec("everything").is_err());
    }
}
