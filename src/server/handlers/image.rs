use anyhow::{bail, Result};
use log::info;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::acl::Resource;
use crate::db::ImageRecord;
use crate::events::{EventContext, Listener};
use crate::imghdr::detect_image_type;
use crate::server::listeners::auth::ARG_PUBLIC_KEY;
use crate::server::response::Response;
use crate::time::current_timestamp;
use crate::types::query::ImageQuery;

use super::route_image;

pub const HEADER_IMAGE_IDENTIFIER: &str = "X-Imgstore-ImageIdentifier";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub user: String,
    pub image_identifier: String,
    pub mime: String,
    pub extension: String,
    pub size: u64,
    pub added: u64,
    pub updated: u64,
}

impl From<ImageRecord> for ImageInfo {
    fn from(record: ImageRecord) -> Self {
        Self {
            user: record.user,
            image_identifier: record.identifier,
            mime: record.mime,
            extension: record.extension,
            size: record.size,
            added: record.added,
            updated: record.updated,
        }
    }
}

#[derive(Serialize)]
struct SearchInfo {
    hits: usize,
    page: u64,
    limit: u64,
    count: usize,
}

#[derive(Serialize)]
struct ImagesBody {
    search: SearchInfo,
    images: Vec<ImageInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadBody {
    image_identifier: String,
    mime: &'static str,
    extension: &'static str,
    size: u64,
}

pub struct UserHandler;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserBody {
    user: String,
    num_images: usize,
}

impl Listener for UserHandler {
    fn name(&self) -> &str {
        "user"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let user = match ctx.request().user() {
            Some(user) => user.to_string(),
            None => bail!("user route without user"),
        };
        let query = ImageQuery::for_user(&user);
        let num_images = ctx.db().with_transaction(|tx, _| tx.count_images(&query))?;
        ctx.set_response(Response::json(&UserBody { user, num_images }));
        Ok(())
    }
}

/// Lists images of one user or of several users, and uploads images.
pub struct ImagesHandler;

impl ImagesHandler {
    fn list(ctx: &mut EventContext) -> Result<()> {
        let mut query = match ImageQuery::from_pairs(ctx.request().query_pairs()) {
            Ok(query) => query,
            Err(err) => {
                ctx.set_response(Response::bad_request(format!("{err:#}")));
                return Ok(());
            }
        };

        match ctx.request().user() {
            Some(user) => query.users = vec![user.to_string()],
            None if query.users.is_empty() => match ctx.get_str_arg(ARG_PUBLIC_KEY) {
                Some(public_key) => query.users = vec![public_key.to_string()],
                None => {
                    ctx.set_response(Response::bad_request("users[] is required"));
                    return Ok(());
                }
            },
            None => {}
        }

        let (records, hits) = ctx.db().with_transaction(|tx, _| {
            let records = tx.list_images(&query)?;
            let hits = tx.count_images(&query)?;
            Ok((records, hits))
        })?;

        let images: Vec<ImageInfo> = records.into_iter().map(ImageInfo::from).collect();
        let body = ImagesBody {
            search: SearchInfo {
                hits,
                page: query.page,
                limit: query.limit,
                count: images.len(),
            },
            images,
        };
        ctx.set_response(Response::json(&body));
        Ok(())
    }

    fn upload(ctx: &mut EventContext) -> Result<()> {
        let user = match ctx.request().user() {
            Some(user) => user.to_string(),
            None => bail!("images route without user"),
        };
        let data = ctx.request().body();
        if data.is_empty() {
            ctx.set_response(Response::bad_request("image data is required"));
            return Ok(());
        }
        let image_type = match detect_image_type(data) {
            Some(image_type) => image_type,
            None => {
                ctx.set_response(Response::unsupported_media_type("Unsupported image type"));
                return Ok(());
            }
        };

        let identifier = format!("{:x}", Sha256::digest(data));
        let now = current_timestamp();
        let record = ImageRecord {
            user: user.clone(),
            identifier: identifier.clone(),
            mime: image_type.mime().to_string(),
            extension: image_type.extension().to_string(),
            size: data.len() as u64,
            data: data.to_vec(),
            added: now,
            updated: now,
        };
        let size = record.size;

        let created = ctx.db().with_transaction(|tx, _| {
            if tx.is_image_exists(&record.user, &record.identifier)? {
                tx.update_image_time(&record.user, &record.identifier)?;
                return Ok(false);
            }
            tx.create_image(&record)?;
            Ok(true)
        })?;

        let body = UploadBody {
            image_identifier: identifier.clone(),
            mime: image_type.mime(),
            extension: image_type.extension(),
            size,
        };
        let resp = if created {
            info!("Added image {user}/{identifier}, {size} bytes");
            Response::created(&body)
        } else {
            info!("Image {user}/{identifier} already exists, touched");
            Response::json(&body)
        };
        ctx.set_response(resp.with_header(HEADER_IMAGE_IDENTIFIER, identifier));
        Ok(())
    }
}

impl Listener for ImagesHandler {
    fn name(&self) -> &str {
        "images"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        match ctx.request().resource() {
            Resource::ImagesPost => Self::upload(ctx),
            _ => Self::list(ctx),
        }
    }
}

/// Serves and deletes single images.
pub struct ImageHandler;

impl ImageHandler {
    fn get(ctx: &mut EventContext) -> Result<()> {
        let (user, image) = route_image(ctx)?;
        let record = ctx
            .db()
            .with_transaction(|tx, _| tx.get_image(&user, &image, true))?;
        let resp = match record {
            Some(record) => image_response(record),
            None => Response::not_found("Image not found"),
        };
        ctx.set_response(resp);
        Ok(())
    }

    fn delete(ctx: &mut EventContext) -> Result<()> {
        let (user, image) = route_image(ctx)?;
        let deleted = ctx.db().with_transaction(|tx, _| {
            if !tx.is_image_exists(&user, &image)? {
                return Ok(false);
            }
            tx.delete_image(&user, &image)?;
            tx.delete_metadata(&user, &image)?;
            tx.delete_image_short_urls(&user, &image)?;
            Ok(true)
        })?;

        let resp = if deleted {
            info!("Deleted image {user}/{image}");
            Response::json(&serde_json::json!({ "imageIdentifier": image }))
        } else {
            Response::not_found("Image not found")
        };
        ctx.set_response(resp);
        Ok(())
    }
}

impl Listener for ImageHandler {
    fn name(&self) -> &str {
        "image"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        match ctx.request().resource() {
            Resource::ImageDelete => Self::delete(ctx),
            _ => Self::get(ctx),
        }
    }
}

/// The image bytes with identifying headers.
pub fn image_response(record: ImageRecord) -> Response {
    let size = record.size.to_string();
    Response::binary(record.mime, record.data)
        .with_header(HEADER_IMAGE_IDENTIFIER, record.identifier)
        .with_header("X-Imgstore-OriginalFileSize", size)
        .with_header("X-Imgstore-OriginalExtension", record.extension)
}
