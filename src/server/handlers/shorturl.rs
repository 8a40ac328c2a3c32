use anyhow::{bail, Result};
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::acl::Resource;
use crate::db::{ShortUrlRecord, Transaction};
use crate::events::{EventContext, Listener};
use crate::server::response::Response;
use crate::server::router::Route;

use super::image::image_response;
use super::{parse_body, route_image};

const SHORT_URL_ID_LEN: usize = 7;
const MAX_ID_ATTEMPTS: usize = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortUrlInfo {
    id: String,
    user: String,
    image_identifier: String,
    query: String,
}

impl From<ShortUrlRecord> for ShortUrlInfo {
    fn from(record: ShortUrlRecord) -> Self {
        Self {
            id: record.id,
            user: record.user,
            image_identifier: record.image,
            query: record.query,
        }
    }
}

#[derive(Deserialize, Default)]
struct NewShortUrl {
    #[serde(default)]
    query: String,
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_URL_ID_LEN)
        .map(char::from)
        .collect()
}

fn unique_id(tx: &dyn Transaction) -> Result<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = generate_id();
        if tx.get_short_url(&id)?.is_none() {
            return Ok(id);
        }
    }
    bail!("failed to generate a unique short url id after {MAX_ID_ATTEMPTS} attempts")
}

/// Creates short urls for an image, or drops all of them.
pub struct ShortUrlsHandler;

impl ShortUrlsHandler {
    fn create(ctx: &mut EventContext) -> Result<()> {
        let (user, image) = route_image(ctx)?;
        let new = if ctx.request().body().is_empty() {
            NewShortUrl::default()
        } else {
            match parse_body::<NewShortUrl>(ctx) {
                Ok(new) => new,
                Err(resp) => {
                    ctx.set_response(resp);
                    return Ok(());
                }
            }
        };
        let query = new.query.trim_start_matches('?').to_string();

        let created = ctx.db().with_transaction(|tx, _| {
            if !tx.is_image_exists(&user, &image)? {
                return Ok(None);
            }
            if let Some(record) = tx.find_short_url(&user, &image, &query)? {
                return Ok(Some((record, false)));
            }
            let record = ShortUrlRecord {
                id: unique_id(tx)?,
                user: user.clone(),
                image: image.clone(),
                query,
            };
            tx.create_short_url(&record)?;
            Ok(Some((record, true)))
        })?;

        let resp = match created {
            Some((record, true)) => {
                info!("Created short url {} for {user}/{image}", record.id);
                Response::created(&ShortUrlInfo::from(record))
            }
            Some((record, false)) => Response::json(&ShortUrlInfo::from(record)),
            None => Response::not_found("Image not found"),
        };
        ctx.set_response(resp);
        Ok(())
    }

    fn delete_all(ctx: &mut EventContext) -> Result<()> {
        let (user, image) = route_image(ctx)?;
        let deleted = ctx
            .db()
            .with_transaction(|tx, _| tx.delete_image_short_urls(&user, &image))?;
        ctx.set_response(Response::json(&serde_json::json!({ "deleted": deleted })));
        Ok(())
    }
}

impl Listener for ShortUrlsHandler {
    fn name(&self) -> &str {
        "shorturls"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        match ctx.request().resource() {
            Resource::ShortUrlsDelete => Self::delete_all(ctx),
            _ => Self::create(ctx),
        }
    }
}

/// Resolves one short url. Under an image it describes the short url, at the
/// global `/s/{id}` route it serves the image itself.
pub struct ShortUrlHandler;

impl ShortUrlHandler {
    fn find(ctx: &EventContext, id: &str) -> Result<Option<ShortUrlRecord>> {
        let record = ctx.db().with_transaction(|tx, _| tx.get_short_url(id))?;
        let record = match (record, ctx.request().user(), ctx.request().image()) {
            (Some(record), Some(user), Some(image))
                if record.user != user || record.image != image =>
            {
                None
            }
            (record, _, _) => record,
        };
        Ok(record)
    }
}

impl Listener for ShortUrlHandler {
    fn name(&self) -> &str {
        "shorturl"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let id = match ctx.request().route() {
            Route::ShortUrl { id, .. } | Route::GlobalShortUrl { id } => id.clone(),
            route => bail!("short url handler on route {route:?}"),
        };
        let record = match Self::find(ctx, &id)? {
            Some(record) => record,
            None => {
                ctx.set_response(Response::not_found("Short url not found"));
                return Ok(());
            }
        };

        let resp = match ctx.request().resource() {
            Resource::ShortUrlDelete => {
                ctx.db().with_transaction(|tx, _| tx.delete_short_url(&id))?;
                info!("Deleted short url {id}");
                Response::json(&serde_json::json!({ "id": id }))
            }
            Resource::GlobalShortUrlGet | Resource::GlobalShortUrlHead => {
                let image = ctx
                    .db()
                    .with_transaction(|tx, _| tx.get_image(&record.user, &record.image, true))?;
                match image {
                    Some(image) => image_response(image),
                    None => Response::not_found("Image not found"),
                }
            }
            _ => Response::json(&ShortUrlInfo::from(record)),
        };
        ctx.set_response(resp);
        Ok(())
    }
}
