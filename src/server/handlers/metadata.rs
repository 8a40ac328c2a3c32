use anyhow::Result;
use serde_json::{Map, Value};

use crate::acl::Resource;
use crate::events::{EventContext, Listener};
use crate::server::response::Response;

use super::{parse_body, route_image};

/// Image metadata: a free-form JSON object attached to one image.
///
/// `PUT` replaces the object, `POST` merges top-level keys into it. Reading
/// metadata that was never set yields an empty object.
pub struct MetadataHandler;

enum Update {
    Replace(Map<String, Value>),
    Merge(Map<String, Value>),
    Delete,
}

impl MetadataHandler {
    fn get(ctx: &mut EventContext) -> Result<()> {
        let (user, image) = route_image(ctx)?;
        let metadata = ctx.db().with_transaction(|tx, _| {
            if !tx.is_image_exists(&user, &image)? {
                return Ok(None);
            }
            Ok(Some(tx.get_metadata(&user, &image)?.unwrap_or_default()))
        })?;
        let resp = match metadata {
            Some(metadata) => Response::json(&metadata),
            None => Response::not_found("Image not found"),
        };
        ctx.set_response(resp);
        Ok(())
    }

    fn update(ctx: &mut EventContext, update: Update) -> Result<()> {
        let (user, image) = route_image(ctx)?;
        let metadata = ctx.db().with_transaction(|tx, _| {
            if !tx.is_image_exists(&user, &image)? {
                return Ok(None);
            }
            let metadata = match update {
                Update::Replace(metadata) => metadata,
                Update::Merge(changes) => {
                    let mut metadata = tx.get_metadata(&user, &image)?.unwrap_or_default();
                    metadata.extend(changes);
                    metadata
                }
                Update::Delete => {
                    tx.delete_metadata(&user, &image)?;
                    return Ok(Some(Map::new()));
                }
            };
            tx.set_metadata(&user, &image, &metadata)?;
            Ok(Some(metadata))
        })?;

        let resp = match metadata {
            Some(metadata) => Response::json(&metadata),
            None => Response::not_found("Image not found"),
        };
        ctx.set_response(resp);
        Ok(())
    }

    fn parse_object(ctx: &EventContext) -> Result<Map<String, Value>, Response> {
        match parse_body::<Value>(ctx)? {
            Value::Object(metadata) => Ok(metadata),
            _ => Err(Response::bad_request("metadata must be a JSON object")),
        }
    }
}

impl Listener for MetadataHandler {
    fn name(&self) -> &str {
        "metadata"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let resource = ctx.request().resource();
        let update = match resource {
            Resource::MetadataPut | Resource::MetadataPost => {
                let metadata = match Self::parse_object(ctx) {
                    Ok(metadata) => metadata,
                    Err(resp) => {
                        ctx.set_response(resp);
                        return Ok(());
                    }
                };
                if resource == Resource::MetadataPut {
                    Update::Replace(metadata)
                } else {
                    Update::Merge(metadata)
                }
            }
            Resource::MetadataDelete => Update::Delete,
            _ => return Self::get(ctx),
        };
        Self::update(ctx, update)
    }
}
