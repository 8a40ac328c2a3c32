use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::acl::UnionAccessControl;
use crate::db::Database;
use crate::server::request::Request;
use crate::server::response::Response;

use super::EventName;

/// Per-request state passed through every listener of the pipeline. A
/// context is never shared between requests.
pub struct EventContext {
    name: Option<EventName>,

    request: Request,
    response: Option<Response>,

    acl: Arc<UnionAccessControl>,
    db: Arc<Database>,

    args: HashMap<String, Value>,

    propagation_stopped: bool,
}

impl EventContext {
    pub fn new(request: Request, acl: Arc<UnionAccessControl>, db: Arc<Database>) -> Self {
        Self {
            name: None,
            request,
            response: None,
            acl,
            db,
            args: HashMap::new(),
            propagation_stopped: false,
        }
    }

    /// The event currently being triggered, `None` before the first trigger.
    pub fn name(&self) -> Option<EventName> {
        self.name
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    pub fn acl(&self) -> &Arc<UnionAccessControl> {
        &self.acl
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    pub fn get_str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    pub fn set_arg(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.args.insert(key.into(), value.into());
    }

    pub fn has_arg(&self, key: &str) -> bool {
        self.args.contains_key(key)
    }

    /// No further listener runs for the current event, and the pipeline
    /// treats the current response as final.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub(super) fn begin(&mut self, name: EventName) {
        self.name = Some(name);
        self.propagation_stopped = false;
    }
}
