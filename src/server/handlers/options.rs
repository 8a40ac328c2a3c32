use anyhow::Result;

use crate::events::{EventContext, Listener};
use crate::server::response::Response;

/// Answers OPTIONS with the methods the route accepts.
pub struct OptionsHandler;

impl Listener for OptionsHandler {
    fn name(&self) -> &str {
        "options"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let allow = ctx
            .request()
            .route()
            .allowed_methods()
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        ctx.set_response(Response::ok().with_header("Allow", allow));
        Ok(())
    }
}
