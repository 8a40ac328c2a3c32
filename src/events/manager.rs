use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::debug;

use super::{EventContext, EventName, Listener, ListenerFilter};

/// How a trigger call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Every listener ran.
    Completed,
    /// A listener stopped propagation, its response is final.
    Stopped,
}

struct Registration {
    listener: Arc<dyn Listener>,
    priority: i32,
    seq: usize,
    filter: Option<ListenerFilter>,
}

/// Collects listener registrations during startup.
#[derive(Default)]
pub struct EventManagerBuilder {
    registrations: HashMap<EventName, Vec<Registration>>,
    seq: usize,
}

impl EventManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every event in `events`. Higher priorities run
    /// first, equal priorities run in registration order. Registering the same
    /// listener name twice for one event is rejected.
    pub fn add_listener<I>(
        &mut self,
        events: I,
        priority: i32,
        listener: Arc<dyn Listener>,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = EventName>,
    {
        self.add_filtered_listener(events, priority, listener, None)
    }

    pub fn add_filtered_listener<I>(
        &mut self,
        events: I,
        priority: i32,
        listener: Arc<dyn Listener>,
        filter: Option<ListenerFilter>,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = EventName>,
    {
        let mut registered = 0;
        for event in events {
            let list = self.registrations.entry(event).or_default();
            if list.iter().any(|r| r.listener.name() == listener.name()) {
                bail!(
                    "listener '{}' is already registered for event '{event}'",
                    listener.name()
                );
            }
            self.seq += 1;
            list.push(Registration {
                listener: listener.clone(),
                priority,
                seq: self.seq,
                filter: filter.clone(),
            });
            registered += 1;
        }
        if registered == 0 {
            bail!("listener '{}' has no events to listen on", listener.name());
        }
        Ok(self)
    }

    /// Same as [`Self::add_listener`] with event names that are validated
    /// here, an unknown name fails the registration.
    pub fn add_listener_by_names<S: AsRef<str>>(
        &mut self,
        names: &[S],
        priority: i32,
        listener: Arc<dyn Listener>,
        filter: Option<ListenerFilter>,
    ) -> Result<&mut Self> {
        let mut events = Vec::with_capacity(names.len());
        for name in names {
            let event: EventName = name
                .as_ref()
                .parse()
                .with_context(|| format!("register listener '{}'", listener.name()))?;
            events.push(event);
        }
        self.add_filtered_listener(events, priority, listener, filter)
    }

    pub fn build(self) -> EventManager {
        let mut listeners = self.registrations;
        for list in listeners.values_mut() {
            list.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        }
        EventManager { listeners }
    }
}

/// Immutable listener table, shared by all requests.
pub struct EventManager {
    listeners: HashMap<EventName, Vec<Registration>>,
}

impl EventManager {
    /// Runs the listeners of `name` against `ctx` until one stops propagation
    /// or fails. A failing listener aborts the trigger, the listeners after it
    /// are not called.
    pub fn trigger(&self, name: EventName, ctx: &mut EventContext) -> Result<EventState> {
        ctx.begin(name);
        let list = match self.listeners.get(&name) {
            Some(list) => list,
            None => return Ok(EventState::Completed),
        };

        for reg in list.iter() {
            if let Some(ref filter) = reg.filter {
                if !filter.allows(ctx.request().user()) {
                    debug!(
                        "Skip listener '{}' for event '{name}', filtered by user",
                        reg.listener.name()
                    );
                    continue;
                }
            }

            debug!("Trigger listener '{}' for event '{name}'", reg.listener.name());
            reg.listener
                .handle(ctx)
                .with_context(|| format!("listener '{}' on '{name}'", reg.listener.name()))?;

            if ctx.is_propagation_stopped() {
                debug!("Listener '{}' stopped event '{name}'", reg.listener.name());
                return Ok(EventState::Stopped);
            }
        }
        Ok(EventState::Completed)
    }

    pub fn has_listeners_for_event(&self, name: EventName) -> bool {
        self.listeners.get(&name).is_some_and(|list| !list.is_empty())
    }

    /// Listener names of an event in the order they run.
    pub fn listener_names(&self, name: EventName) -> Vec<&str> {
        match self.listeners.get(&name) {
            Some(list) => list.iter().map(|r| r.listener.name()).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use serde_json::Value;

    use super::*;
    use crate::acl::{Resource, SimpleArrayAdapter, UnionAccessControl};
    use crate::db::Database;
    use crate::server::request::Request;
    use crate::server::response::Response;

    struct Recorder {
        name: String,
        stop: bool,
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Listener for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle(&self, ctx: &mut EventContext) -> Result<()> {
            self.calls.lock().unwrap().push(self.name.clone());
            if self.fail {
                return Err(anyhow!("{} failed", self.name));
            }
            ctx.set_arg("last", Value::String(self.name.clone()));
            if self.stop {
                ctx.set_response(Response::ok());
                ctx.stop_propagation();
            }
            Ok(())
        }
    }

    fn recorder(
        name: &str,
        stop: bool,
        fail: bool,
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Listener> {
        Arc::new(Recorder {
            name: name.to_string(),
            stop,
            fail,
            calls: calls.clone(),
        })
    }

    fn new_context(path: &str) -> EventContext {
        let acl = UnionAccessControl::Simple(
            SimpleArrayAdapter::new([(String::from("alice"), String::from("secret"))]).unwrap(),
        );
        let url = format!("http://localhost{path}");
        let request = Request::parse("GET", &url, [], Vec::new()).unwrap();
        EventContext::new(request, Arc::new(acl), Arc::new(Database::new_test()))
    }

    const EVENT: EventName = EventName::Resource(Resource::ImageGet);

    #[test]
    fn test_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventManagerBuilder::new();
        builder
            .add_listener([EVENT], 5, recorder("l3", false, false, &calls))
            .unwrap()
            .add_listener([EVENT], 10, recorder("l1", false, false, &calls))
            .unwrap()
            .add_listener([EVENT], 10, recorder("l2", false, false, &calls))
            .unwrap();
        let manager = builder.build();
        assert_eq!(manager.listener_names(EVENT), vec!["l1", "l2", "l3"]);

        let mut ctx = new_context("/users/alice/images/abc");
        let state = manager.trigger(EVENT, &mut ctx).unwrap();
        assert_eq!(state, EventState::Completed);
        assert_eq!(*calls.lock().unwrap(), vec!["l1", "l2", "l3"]);
        assert_eq!(ctx.get_str_arg("last"), Some("l3"));
        assert_eq!(ctx.name(), Some(EVENT));

        assert!(manager.has_listeners_for_event(EVENT));
        assert!(!manager.has_listeners_for_event(EventName::ResponseSend));
        let state = manager.trigger(EventName::ResponseSend, &mut ctx).unwrap();
        assert_eq!(state, EventState::Completed, "event without listeners completes");
    }

    #[test]
    fn test_stop() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventManagerBuilder::new();
        builder
            .add_listener([EVENT], 10, recorder("l1", true, false, &calls))
            .unwrap()
            .add_listener([EVENT], 10, recorder("l2", false, false, &calls))
            .unwrap()
            .add_listener([EVENT], 5, recorder("l3", false, false, &calls))
            .unwrap();
        let manager = builder.build();

        let mut ctx = new_context("/users/alice/images/abc");
        let state = manager.trigger(EVENT, &mut ctx).unwrap();
        assert_eq!(state, EventState::Stopped);
        assert_eq!(*calls.lock().unwrap(), vec!["l1"]);
        assert_eq!(ctx.get_str_arg("last"), Some("l1"));
        assert!(ctx.response().is_some());

        // Every trigger starts with propagation enabled again
        let state = manager
            .trigger(EventName::RequestAuthorize, &mut ctx)
            .unwrap();
        assert_eq!(state, EventState::Completed);
        assert!(!ctx.is_propagation_stopped());
    }

    #[test]
    fn test_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventManagerBuilder::new();
        builder
            .add_listener([EVENT], 10, recorder("l1", false, true, &calls))
            .unwrap()
            .add_listener([EVENT], 5, recorder("l2", false, false, &calls))
            .unwrap();
        let manager = builder.build();

        let mut ctx = new_context("/users/alice/images/abc");
        let err = manager.trigger(EVENT, &mut ctx).unwrap_err();
        assert!(format!("{err:#}").contains("l1 failed"));
        assert_eq!(*calls.lock().unwrap(), vec!["l1"], "l2 must not run");
    }

    #[test]
    fn test_filter() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventManagerBuilder::new();
        builder
            .add_filtered_listener(
                [EVENT],
                10,
                recorder("only-bob", true, false, &calls),
                Some(ListenerFilter::Whitelist(["bob".to_string()].into())),
            )
            .unwrap()
            .add_listener([EVENT], 0, recorder("everyone", false, false, &calls))
            .unwrap();
        let manager = builder.build();

        let mut ctx = new_context("/users/alice/images/abc");
        let state = manager.trigger(EVENT, &mut ctx).unwrap();
        assert_eq!(state, EventState::Completed);
        assert_eq!(*calls.lock().unwrap(), vec!["everyone"]);

        calls.lock().unwrap().clear();
        let mut ctx = new_context("/users/bob/images/abc");
        let state = manager.trigger(EVENT, &mut ctx).unwrap();
        assert_eq!(state, EventState::Stopped);
        assert_eq!(*calls.lock().unwrap(), vec!["only-bob"]);
    }

    #[test]
    fn test_registration() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventManagerBuilder::new();

        let result = builder.add_listener_by_names(
            &["image.get", "image.fly"],
            0,
            recorder("l1", false, false, &calls),
            None,
        );
        assert!(result.is_err(), "unknown event name must be rejected");

        builder
            .add_listener_by_names(
                &["image.get", "response.send"],
                0,
                recorder("l1", false, false, &calls),
                None,
            )
            .unwrap();
        let result = builder.add_listener([EVENT], 1, recorder("l1", false, false, &calls));
        assert!(result.is_err(), "duplicate registration must be rejected");

        let result = builder.add_listener(Vec::new(), 1, recorder("l2", false, false, &calls));
        assert!(result.is_err());

        let manager = builder.build();
        assert!(manager.has_listeners_for_event(EventName::ResponseSend));
        assert_eq!(manager.listener_names(EVENT), vec!["l1"]);
    }
}
