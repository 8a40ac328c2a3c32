mod admin;
mod image;
mod metadata;
mod options;
mod shorturl;
mod system;

use std::sync::Arc;

use actix_web::http::StatusCode;
use anyhow::{bail, Result};
use log::error;
use serde::de::DeserializeOwned;

use crate::acl::{AclError, Resource};
use crate::events::{EventContext, EventManagerBuilder, EventName, Listener};

use super::listeners::stats::StatsCounter;
use super::response::Response;

pub use admin::{AccessRulesHandler, GroupsHandler, KeysHandler};
pub use image::{ImageHandler, ImagesHandler, UserHandler};
pub use metadata::MetadataHandler;
pub use options::OptionsHandler;
pub use shorturl::{ShortUrlHandler, ShortUrlsHandler};
pub use system::{IndexHandler, StatsHandler, StatusHandler};

/// Resource handlers run after every other listener of their event.
pub const HANDLER_PRIORITY: i32 = 0;

/// Registers one handler for every resource event.
pub fn register_handlers(builder: &mut EventManagerBuilder, stats: Arc<StatsCounter>) -> Result<()> {
    use Resource::*;

    let handlers: Vec<(Arc<dyn Listener>, Vec<Resource>)> = vec![
        (Arc::new(IndexHandler), vec![IndexGet, IndexHead]),
        (Arc::new(StatusHandler), vec![StatusGet, StatusHead]),
        (Arc::new(StatsHandler::new(stats)), vec![StatsGet, StatsHead]),
        (Arc::new(UserHandler), vec![UserGet, UserHead]),
        (
            Arc::new(ImagesHandler),
            vec![
                ImagesGet,
                ImagesHead,
                ImagesPost,
                GlobalImagesGet,
                GlobalImagesHead,
            ],
        ),
        (Arc::new(ImageHandler), vec![ImageGet, ImageHead, ImageDelete]),
        (
            Arc::new(MetadataHandler),
            vec![
                MetadataGet,
                MetadataHead,
                MetadataPut,
                MetadataPost,
                MetadataDelete,
            ],
        ),
        (
            Arc::new(ShortUrlsHandler),
            vec![ShortUrlsPost, ShortUrlsDelete],
        ),
        (
            Arc::new(ShortUrlHandler),
            vec![
                ShortUrlGet,
                ShortUrlHead,
                ShortUrlDelete,
                GlobalShortUrlGet,
                GlobalShortUrlHead,
            ],
        ),
        (Arc::new(KeysHandler), vec![KeysPut, KeysHead, KeysDelete]),
        (
            Arc::new(AccessRulesHandler),
            vec![
                AccessRulesGet,
                AccessRulesHead,
                AccessRulePost,
                AccessRuleGet,
                AccessRuleHead,
                AccessRuleDelete,
            ],
        ),
        (
            Arc::new(GroupsHandler),
            vec![
                GroupsGet,
                GroupsHead,
                GroupGet,
                GroupHead,
                GroupPut,
                GroupDelete,
            ],
        ),
        (
            Arc::new(OptionsHandler),
            vec![
                UserOptions,
                ImagesOptions,
                GlobalImagesOptions,
                ImageOptions,
                MetadataOptions,
                ShortUrlOptions,
                ShortUrlsOptions,
                KeysOptions,
                AccessRulesOptions,
                AccessRuleOptions,
                GroupsOptions,
                GroupOptions,
            ],
        ),
    ];

    for (handler, resources) in handlers {
        builder.add_listener(
            resources.into_iter().map(EventName::Resource),
            HANDLER_PRIORITY,
            handler,
        )?;
    }
    Ok(())
}

/// Maps access-control errors to responses. Store failures stay errors.
fn acl_error_response(err: AclError) -> Result<Response> {
    let resp = match err {
        AclError::KeyPairExists(_) | AclError::GroupExists(_) => Response::conflict(err.to_string()),
        AclError::PublicKeyNotFound(_)
        | AclError::AccessRuleNotFound(_, _)
        | AclError::GroupNotFound(_) => Response::not_found(err.to_string()),
        AclError::InvalidKeyPair(_)
        | AclError::InvalidRule(_)
        | AclError::UnknownResource(_)
        | AclError::InvalidQuery(_) => Response::bad_request(err.to_string()),
        AclError::Immutable => Response::failure(StatusCode::METHOD_NOT_ALLOWED, err.to_string()),
        AclError::Store(err) => {
            error!("Access control store failed: {err:#}");
            return Err(err);
        }
    };
    Ok(resp)
}

/// Decodes a JSON request body, a bad body is answered with 400.
fn parse_body<T: DeserializeOwned>(ctx: &EventContext) -> Result<T, Response> {
    let body = ctx.request().body();
    if body.is_empty() {
        return Err(Response::bad_request("request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| Response::bad_request(format!("invalid body: {e}")))
}

/// User and image of the route.
fn route_image(ctx: &EventContext) -> Result<(String, String)> {
    match (ctx.request().user(), ctx.request().image()) {
        (Some(user), Some(image)) => Ok((user.to_string(), image.to_string())),
        _ => bail!("route of {} has no image", ctx.request().resource()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_resource_has_one_handler() {
        let mut builder = EventManagerBuilder::new();
        register_handlers(&mut builder, Arc::new(StatsCounter::default())).unwrap();
        let manager = builder.build();
        for resource in Resource::ALL {
            let names = manager.listener_names(EventName::Resource(*resource));
            assert_eq!(names.len(), 1, "{resource} handlers: {names:?}");
        }
    }

    #[test]
    fn test_acl_error_response() {
        let cases = [
            (AclError::KeyPairExists("k".into()), StatusCode::CONFLICT),
            (AclError::GroupNotFound("g".into()), StatusCode::NOT_FOUND),
            (AclError::InvalidRule("r".into()), StatusCode::BAD_REQUEST),
            (AclError::Immutable, StatusCode::METHOD_NOT_ALLOWED),
        ];
        for (err, status) in cases {
            assert_eq!(acl_error_response(err).unwrap().status(), status);
        }
        let err = AclError::Store(anyhow::anyhow!("disk full"));
        assert!(acl_error_response(err).is_err());
    }
}
