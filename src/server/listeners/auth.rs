use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};

use crate::acl::{AccessControl, Resource};
use crate::events::{EventContext, Listener};
use crate::server::response::Response;
use crate::types::response::ErrorCode;

use super::signature::SignatureVerifier;

pub const HEADER_PUBLIC_KEY: &str = "x-imgstore-publickey";
pub const QUERY_PUBLIC_KEY: &str = "publicKey";

/// Context argument holding the authenticated public key.
pub const ARG_PUBLIC_KEY: &str = "public_key";

/// Authorizes every request before its resource event fires. Denials set a
/// 400 response with an error code and stop the pipeline, store failures
/// are returned as errors.
pub struct AccessControlListener {
    allow_list: BTreeSet<Resource>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl AccessControlListener {
    pub const NAME: &'static str = "access-control";
    pub const PRIORITY: i32 = 100;

    /// Requests for resources in `allow_list` skip authorization. Without a
    /// verifier, requests are authorized by public key alone.
    pub fn new(
        allow_list: BTreeSet<Resource>,
        verifier: Option<Arc<dyn SignatureVerifier>>,
    ) -> Self {
        Self {
            allow_list,
            verifier,
        }
    }

    fn deny(ctx: &mut EventContext, code: ErrorCode, message: &str) {
        let req = ctx.request();
        warn!(
            "Deny {} {} ({}): {message}",
            req.method(),
            req.path(),
            req.resource()
        );
        ctx.set_response(Response::denied(code, message));
        ctx.stop_propagation();
    }

    /// `publicKey` query parameter, then the public key header, then the user
    /// the request acts on.
    fn find_public_key(ctx: &EventContext) -> Option<String> {
        let req = ctx.request();
        req.query(QUERY_PUBLIC_KEY)
            .or_else(|| req.header(HEADER_PUBLIC_KEY))
            .or_else(|| req.user())
            .filter(|pk| !pk.is_empty())
            .map(String::from)
    }

    /// The users a request acts on. Global image listings act on every user
    /// named in `users[]`, or on the caller when none is named.
    fn target_users(ctx: &EventContext) -> Vec<Option<String>> {
        let req = ctx.request();
        match req.resource() {
            Resource::GlobalImagesGet | Resource::GlobalImagesHead => {
                let users = req.query_all("users");
                if users.is_empty() {
                    vec![None]
                } else {
                    users.into_iter().map(|u| Some(u.to_string())).collect()
                }
            }
            _ => vec![req.user().map(String::from)],
        }
    }
}

impl Listener for AccessControlListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let resource = ctx.request().resource();
        if self.allow_list.contains(&resource) {
            debug!("Resource {resource} is allow-listed, skip authorization");
            return Ok(());
        }

        let public_key = match Self::find_public_key(ctx) {
            Some(public_key) => public_key,
            None => {
                Self::deny(ctx, ErrorCode::MissingAuthParam, "Missing public key");
                return Ok(());
            }
        };

        let acl = ctx.acl().clone();
        if !acl.public_key_exists(&public_key)? {
            Self::deny(ctx, ErrorCode::UnknownPublicKey, "Unknown public key");
            return Ok(());
        }

        if let Some(ref verifier) = self.verifier {
            let private_key = match acl.get_private_key(&public_key)? {
                Some(private_key) => private_key,
                None => {
                    Self::deny(ctx, ErrorCode::UnknownPublicKey, "Unknown public key");
                    return Ok(());
                }
            };
            if let Err(denial) = verifier.verify(&private_key, &public_key, ctx.request()) {
                Self::deny(ctx, denial.code, &denial.message);
                return Ok(());
            }
        }

        for user in Self::target_users(ctx) {
            if !acl.has_access(&public_key, resource, user.as_deref())? {
                let message = match user {
                    Some(user) => format!("Public key has no access to {resource} of '{user}'"),
                    None => format!("Public key has no access to {resource}"),
                };
                Self::deny(ctx, ErrorCode::PermissionDenied, &message);
                return Ok(());
            }
        }

        debug!("Authorized '{public_key}' for {resource}");
        ctx.set_arg(ARG_PUBLIC_KEY, public_key);
        Ok(())
    }
}
