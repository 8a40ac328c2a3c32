use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::acl::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Writes must be signed, reads may need an access token.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Delete)
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            _ => bail!("unsupported method '{s}'"),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A matched path. Path parameters are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Index,
    Status,
    Stats,
    User { user: String },
    Images { user: String },
    GlobalImages,
    Image { user: String, image: String },
    Metadata { user: String, image: String },
    ShortUrls { user: String, image: String },
    ShortUrl { user: String, image: String, id: String },
    GlobalShortUrl { id: String },
    Keys { public_key: String },
    AccessRules { public_key: String },
    AccessRule { public_key: String, id: u64 },
    Groups,
    Group { name: String },
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => Self::Index,
            ["status"] => Self::Status,
            ["stats"] => Self::Stats,
            ["users", user] => Self::User {
                user: user.to_string(),
            },
            ["users", user, "images"] => Self::Images {
                user: user.to_string(),
            },
            ["images"] => Self::GlobalImages,
            ["users", user, "images", image] => Self::Image {
                user: user.to_string(),
                image: image.to_string(),
            },
            ["users", user, "images", image, "metadata" | "meta"] => Self::Metadata {
                user: user.to_string(),
                image: image.to_string(),
            },
            ["users", user, "images", image, "shorturls"] => Self::ShortUrls {
                user: user.to_string(),
                image: image.to_string(),
            },
            ["users", user, "images", image, "shorturls", id] => Self::ShortUrl {
                user: user.to_string(),
                image: image.to_string(),
                id: id.to_string(),
            },
            ["s", id] => Self::GlobalShortUrl { id: id.to_string() },
            ["keys", public_key] => Self::Keys {
                public_key: public_key.to_string(),
            },
            ["keys", public_key, "access"] => Self::AccessRules {
                public_key: public_key.to_string(),
            },
            ["keys", public_key, "access", id] => Self::AccessRule {
                public_key: public_key.to_string(),
                id: id.parse().ok()?,
            },
            ["groups"] => Self::Groups,
            ["groups", name] => Self::Group {
                name: name.to_string(),
            },
            _ => return None,
        };
        Some(route)
    }

    /// The user the request acts on, if the route names one.
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::User { user }
            | Self::Images { user }
            | Self::Image { user, .. }
            | Self::Metadata { user, .. }
            | Self::ShortUrls { user, .. }
            | Self::ShortUrl { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Image { image, .. }
            | Self::Metadata { image, .. }
            | Self::ShortUrls { image, .. }
            | Self::ShortUrl { image, .. } => Some(image),
            _ => None,
        }
    }

    /// Resolves the resource of a method on this route, `None` when the
    /// route does not support the method.
    pub fn resource(&self, method: Method) -> Option<Resource> {
        use Method::*;
        use Resource as R;

        let resource = match (self, method) {
            (Self::Index, Get) => R::IndexGet,
            (Self::Index, Head) => R::IndexHead,

            (Self::Status, Get) => R::StatusGet,
            (Self::Status, Head) => R::StatusHead,

            (Self::Stats, Get) => R::StatsGet,
            (Self::Stats, Head) => R::StatsHead,

            (Self::User { .. }, Get) => R::UserGet,
            (Self::User { .. }, Head) => R::UserHead,
            (Self::User { .. }, Options) => R::UserOptions,

            (Self::Images { .. }, Get) => R::ImagesGet,
            (Self::Images { .. }, Head) => R::ImagesHead,
            (Self::Images { .. }, Options) => R::ImagesOptions,
            (Self::Images { .. }, Post) => R::ImagesPost,

            (Self::GlobalImages, Get) => R::GlobalImagesGet,
            (Self::GlobalImages, Head) => R::GlobalImagesHead,
            (Self::GlobalImages, Options) => R::GlobalImagesOptions,

            (Self::Image { .. }, Get) => R::ImageGet,
            (Self::Image { .. }, Head) => R::ImageHead,
            (Self::Image { .. }, Options) => R::ImageOptions,
            (Self::Image { .. }, Delete) => R::ImageDelete,

            (Self::Metadata { .. }, Get) => R::MetadataGet,
            (Self::Metadata { .. }, Head) => R::MetadataHead,
            (Self::Metadata { .. }, Options) => R::MetadataOptions,
            (Self::Metadata { .. }, Put) => R::MetadataPut,
            (Self::Metadata { .. }, Post) => R::MetadataPost,
            (Self::Metadata { .. }, Delete) => R::MetadataDelete,

            (Self::ShortUrls { .. }, Options) => R::ShortUrlsOptions,
            (Self::ShortUrls { .. }, Post) => R::ShortUrlsPost,
            (Self::ShortUrls { .. }, Delete) => R::ShortUrlsDelete,

            (Self::ShortUrl { .. }, Get) => R::ShortUrlGet,
            (Self::ShortUrl { .. }, Head) => R::ShortUrlHead,
            (Self::ShortUrl { .. }, Options) => R::ShortUrlOptions,
            (Self::ShortUrl { .. }, Delete) => R::ShortUrlDelete,

            (Self::GlobalShortUrl { .. }, Get) => R::GlobalShortUrlGet,
            (Self::GlobalShortUrl { .. }, Head) => R::GlobalShortUrlHead,

            (Self::Keys { .. }, Put) => R::KeysPut,
            (Self::Keys { .. }, Head) => R::KeysHead,
            (Self::Keys { .. }, Delete) => R::KeysDelete,
            (Self::Keys { .. }, Options) => R::KeysOptions,

            (Self::AccessRules { .. }, Get) => R::AccessRulesGet,
            (Self::AccessRules { .. }, Head) => R::AccessRulesHead,
            (Self::AccessRules { .. }, Options) => R::AccessRulesOptions,
            (Self::AccessRules { .. }, Post) => R::AccessRulePost,

            (Self::AccessRule { .. }, Get) => R::AccessRuleGet,
            (Self::AccessRule { .. }, Head) => R::AccessRuleHead,
            (Self::AccessRule { .. }, Delete) => R::AccessRuleDelete,
            (Self::AccessRule { .. }, Options) => R::AccessRuleOptions,

            (Self::Groups, Get) => R::GroupsGet,
            (Self::Groups, Head) => R::GroupsHead,
            (Self::Groups, Options) => R::GroupsOptions,

            (Self::Group { .. }, Get) => R::GroupGet,
            (Self::Group { .. }, Head) => R::GroupHead,
            (Self::Group { .. }, Put) => R::GroupPut,
            (Self::Group { .. }, Delete) => R::GroupDelete,
            (Self::Group { .. }, Options) => R::GroupOptions,

            _ => return None,
        };
        Some(resource)
    }

    pub fn allowed_methods(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| self.resource(*m).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cases = [
            ("/", Route::Index),
            ("/status", Route::Status),
            ("/stats/", Route::Stats),
            ("/users/alice", Route::User { user: "alice".into() }),
            (
                "/users/alice/images",
                Route::Images {
                    user: "alice".into(),
                },
            ),
            ("/images", Route::GlobalImages),
            (
                "/users/alice/images/abc",
                Route::Image {
                    user: "alice".into(),
                    image: "abc".into(),
                },
            ),
            (
                "/users/alice/images/abc/meta",
                Route::Metadata {
                    user: "alice".into(),
                    image: "abc".into(),
                },
            ),
            (
                "/users/alice/images/abc/metadata",
                Route::Metadata {
                    user: "alice".into(),
                    image: "abc".into(),
                },
            ),
            (
                "/users/alice/images/abc/shorturls/x1y2z3a",
                Route::ShortUrl {
                    user: "alice".into(),
                    image: "abc".into(),
                    id: "x1y2z3a".into(),
                },
            ),
            ("/s/x1y2z3a", Route::GlobalShortUrl { id: "x1y2z3a".into() }),
            (
                "/keys/alice/access/3",
                Route::AccessRule {
                    public_key: "alice".into(),
                    id: 3,
                },
            ),
            ("/groups/editors", Route::Group { name: "editors".into() }),
        ];
        for (path, expect) in cases {
            assert_eq!(Route::parse(path), Some(expect), "path {path}");
        }

        for path in ["/users", "/keys/alice/access/abc", "/unknown", "/users/a/images/b/c"] {
            assert_eq!(Route::parse(path), None, "path {path} must not match");
        }
    }

    #[test]
    fn test_resource() {
        let route = Route::parse("/users/alice/images/abc/metadata").unwrap();
        assert_eq!(route.user(), Some("alice"));
        assert_eq!(route.image(), Some("abc"));
        assert_eq!(route.resource(Method::Put), Some(Resource::MetadataPut));
        assert_eq!(
            route.allowed_methods(),
            vec![
                Method::Get,
                Method::Head,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Options
            ]
        );

        let route = Route::parse("/keys/alice/access").unwrap();
        assert_eq!(route.user(), None);
        assert_eq!(route.resource(Method::Post), Some(Resource::AccessRulePost));
        assert_eq!(route.resource(Method::Delete), None);

        let route = Route::parse("/s/abc").unwrap();
        assert_eq!(route.resource(Method::Options), None);
        assert_eq!(route.allowed_methods(), vec![Method::Get, Method::Head]);

        // Every resource is reachable from exactly one route/method pair
        let routes = [
            "/", "/status", "/stats", "/users/u", "/users/u/images", "/images",
            "/users/u/images/i", "/users/u/images/i/metadata", "/users/u/images/i/shorturls",
            "/users/u/images/i/shorturls/s", "/s/s", "/keys/k", "/keys/k/access",
            "/keys/k/access/1", "/groups", "/groups/g",
        ];
        let mut seen = Vec::new();
        for path in routes {
            let route = Route::parse(path).unwrap();
            for method in Method::ALL {
                if let Some(resource) = route.resource(method) {
                    assert!(!seen.contains(&resource), "{resource} reached twice");
                    seen.push(resource);
                }
            }
        }
        assert_eq!(seen.len(), Resource::ALL.len());
    }
}
