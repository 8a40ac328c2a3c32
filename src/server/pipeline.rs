use std::sync::Arc;

use anyhow::Result;
use log::{debug, error};

use crate::acl::UnionAccessControl;
use crate::db::Database;
use crate::events::{EventContext, EventManager, EventName, EventState};

use super::request::Request;
use super::response::{Response, HANDLER_ERROR};
use super::router::Method;

/// Drives one request through the events:
///
/// `route.match` -> `request.authorize` -> resource event -> `response.send`
///
/// The first stage that stops propagation makes the current response final,
/// later stages before `response.send` are skipped. A failing listener turns
/// the response into a 500. `response.send` always fires, it observes the
/// final response and its failures are only logged.
pub struct Pipeline {
    events: EventManager,
    acl: Arc<UnionAccessControl>,
    db: Arc<Database>,
}

impl Pipeline {
    pub fn new(events: EventManager, acl: Arc<UnionAccessControl>, db: Arc<Database>) -> Self {
        Self { events, acl, db }
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn handle(&self, req: Request) -> Response {
        let method = req.method();
        let mut ctx = EventContext::new(req, self.acl.clone(), self.db.clone());

        let mut resp = match self.dispatch(&mut ctx) {
            Ok(()) => match ctx.take_response() {
                Some(resp) => resp,
                None => {
                    error!(
                        "No listener answered {} {}",
                        ctx.request().method(),
                        ctx.request().resource()
                    );
                    Response::error(HANDLER_ERROR)
                }
            },
            Err(err) => {
                error!("Handle {} {} failed: {err:#}", method, ctx.request().path());
                Response::error(HANDLER_ERROR)
            }
        };
        if method == Method::Head {
            resp.strip_body();
        }

        ctx.set_response(resp);
        if let Err(err) = self.events.trigger(EventName::ResponseSend, &mut ctx) {
            error!("Listener failed after response: {err:#}");
        }
        match ctx.take_response() {
            Some(resp) => resp,
            None => Response::error(HANDLER_ERROR),
        }
    }

    fn dispatch(&self, ctx: &mut EventContext) -> Result<()> {
        let stages = [
            EventName::RouteMatch,
            EventName::RequestAuthorize,
            EventName::Resource(ctx.request().resource()),
        ];
        for name in stages {
            if !self.events.has_listeners_for_event(name) {
                continue;
            }
            if self.events.trigger(name, ctx)? == EventState::Stopped {
                debug!("Event '{name}' stopped the request");
                break;
            }
        }
        Ok(())
    }
}
