use std::collections::BTreeSet;

use anyhow::{bail, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::acl::resource::expand_resource_spec;
use crate::acl::{
    AccessControl, AclError, GroupQuery, MutableAccessControl, NewAccessRule, Resource,
};
use crate::events::{EventContext, Listener};
use crate::server::response::Response;
use crate::server::router::Route;

use super::{acl_error_response, parse_body};

/// Sets `ctx`'s response from an access-control result.
fn respond<T>(
    ctx: &mut EventContext,
    result: Result<T, AclError>,
    ok: impl FnOnce(T) -> Response,
) -> Result<()> {
    let resp = match result {
        Ok(value) => ok(value),
        Err(err) => acl_error_response(err)?,
    };
    ctx.set_response(resp);
    Ok(())
}

macro_rules! body_or_respond {
    ($ctx:expr, $ty:ty) => {
        match parse_body::<$ty>($ctx) {
            Ok(body) => body,
            Err(resp) => {
                $ctx.set_response(resp);
                return Ok(());
            }
        }
    };
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyBody {
    private_key: String,
}

/// Creates, probes and deletes key pairs.
pub struct KeysHandler;

impl Listener for KeysHandler {
    fn name(&self) -> &str {
        "keys"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let public_key = match ctx.request().route() {
            Route::Keys { public_key } => public_key.clone(),
            route => bail!("keys handler on route {route:?}"),
        };

        match ctx.request().resource() {
            Resource::KeysPut => {
                let body = body_or_respond!(ctx, KeyBody);
                let result = ctx.acl().add_key_pair(&public_key, &body.private_key);
                respond(ctx, result, |_| {
                    info!("Added key pair for public key '{public_key}'");
                    Response::created(&serde_json::json!({ "publicKey": public_key }))
                })
            }
            Resource::KeysDelete => {
                let result = ctx.acl().delete_public_key(&public_key);
                respond(ctx, result, |_| {
                    info!("Deleted public key '{public_key}'");
                    Response::json(&serde_json::json!({ "publicKey": public_key }))
                })
            }
            _ => {
                let result = ctx.acl().public_key_exists(&public_key);
                respond(ctx, result, |exists| {
                    if exists {
                        Response::ok()
                    } else {
                        Response::not_found("Public key not found")
                    }
                })
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesBody {
    Many(Vec<NewAccessRule>),
    One(NewAccessRule),
}

#[derive(Serialize)]
struct CreatedRule {
    id: u64,
}

/// Lists, adds, reads and removes the access rules of a public key.
pub struct AccessRulesHandler;

impl AccessRulesHandler {
    fn add(ctx: &mut EventContext, public_key: &str) -> Result<()> {
        let rules = match body_or_respond!(ctx, RulesBody) {
            RulesBody::Many(rules) => rules,
            RulesBody::One(rule) => vec![rule],
        };
        if rules.is_empty() {
            ctx.set_response(Response::bad_request("at least one access rule is required"));
            return Ok(());
        }

        let resp = match ctx.acl().add_access_rules(public_key, rules) {
            Ok(ids) => {
                let created: Vec<_> = ids.into_iter().map(|id| CreatedRule { id }).collect();
                Response::created(&created)
            }
            Err(AclError::GroupNotFound(name)) => {
                let message = format!("rule references unknown resource group '{name}'");
                Response::bad_request(message)
            }
            Err(err) => acl_error_response(err)?,
        };
        ctx.set_response(resp);
        Ok(())
    }
}

impl Listener for AccessRulesHandler {
    fn name(&self) -> &str {
        "accessrules"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let (public_key, id) = match ctx.request().route() {
            Route::AccessRules { public_key } => (public_key.clone(), None),
            Route::AccessRule { public_key, id } => (public_key.clone(), Some(*id)),
            route => bail!("access rules handler on route {route:?}"),
        };

        match (ctx.request().resource(), id) {
            (Resource::AccessRulePost, _) => Self::add(ctx, &public_key),
            (Resource::AccessRuleDelete, Some(id)) => {
                let result = ctx.acl().delete_access_rule(&public_key, id);
                respond(ctx, result, |_| {
                    info!("Deleted access rule {id} of public key '{public_key}'");
                    Response::json(&serde_json::json!({ "id": id }))
                })
            }
            (_, Some(id)) => {
                let result = ctx.acl().get_access_rule(&public_key, id);
                respond(ctx, result, |rule| match rule {
                    Some(rule) => Response::json(&rule),
                    None => Response::not_found("Access rule not found"),
                })
            }
            (_, None) => {
                let result = ctx.acl().get_access_list(&public_key);
                respond(ctx, result, |rules| Response::json(&rules))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupBody {
    Object { resources: Vec<String> },
    List(Vec<String>),
}

impl GroupBody {
    fn resources(self) -> Result<BTreeSet<Resource>, AclError> {
        let specs = match self {
            GroupBody::Object { resources } => resources,
            GroupBody::List(resources) => resources,
        };
        let mut resources = BTreeSet::new();
        for spec in specs {
            resources.extend(expand_resource_spec(&spec)?);
        }
        Ok(resources)
    }
}

/// Resource group listing and administration.
pub struct GroupsHandler;

impl GroupsHandler {
    fn list(ctx: &mut EventContext) -> Result<()> {
        let query = match Self::parse_query(ctx) {
            Ok(query) => query,
            Err(resp) => {
                ctx.set_response(resp);
                return Ok(());
            }
        };
        let result = ctx.acl().get_groups(&query);
        respond(ctx, result, |page| Response::json(&page))
    }

    fn parse_query(ctx: &EventContext) -> Result<GroupQuery, Response> {
        let mut query = GroupQuery::default();
        if let Some(page) = ctx.request().query("page") {
            let page = page
                .parse()
                .map_err(|_| Response::bad_request("page must be a positive integer"))?;
            query = query
                .with_page(page)
                .map_err(|e| Response::bad_request(e.to_string()))?;
        }
        if let Some(limit) = ctx.request().query("limit") {
            let limit = limit
                .parse()
                .map_err(|_| Response::bad_request("limit must be a positive integer"))?;
            query = query
                .with_limit(limit)
                .map_err(|e| Response::bad_request(e.to_string()))?;
        }
        Ok(query)
    }

    fn put(ctx: &mut EventContext, name: &str) -> Result<()> {
        let resources = match body_or_respond!(ctx, GroupBody).resources() {
            Ok(resources) => resources,
            Err(err) => {
                ctx.set_response(acl_error_response(err)?);
                return Ok(());
            }
        };

        let result = match ctx.acl().group_exists(name) {
            Ok(true) => ctx
                .acl()
                .update_resource_group(name, &resources)
                .map(|_| false),
            Ok(false) => ctx.acl().add_resource_group(name, &resources).map(|_| true),
            Err(err) => Err(err),
        };
        respond(ctx, result, |created| {
            let body = serde_json::json!({ "name": name, "resources": resources });
            if created {
                Response::created(&body)
            } else {
                Response::json(&body)
            }
        })
    }
}

impl Listener for GroupsHandler {
    fn name(&self) -> &str {
        "groups"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let name = match ctx.request().route() {
            Route::Groups => return Self::list(ctx),
            Route::Group { name } => name.clone(),
            route => bail!("groups handler on route {route:?}"),
        };

        match ctx.request().resource() {
            Resource::GroupPut => Self::put(ctx, &name),
            Resource::GroupDelete => {
                let result = ctx.acl().delete_resource_group(&name);
                respond(ctx, result, |_| {
                    info!("Deleted resource group '{name}'");
                    Response::json(&serde_json::json!({ "name": name }))
                })
            }
            _ => {
                let result = ctx.acl().get_group(&name);
                respond(ctx, result, |resources| match resources {
                    Some(resources) => {
                        Response::json(&serde_json::json!({ "name": name, "resources": resources }))
                    }
                    None => Response::not_found("Resource group not found"),
                })
            }
        }
    }
}
