//! Catalogue of every field name panels have reported on the `fields`
//! channel, for editors that offer field pickers.

use crate::consts::dash_consts::{ALL, FIELDS_CHANNEL};
use crate::events::{EventBus, Listener, ListenerId, Subscription};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct FieldCatalog {
    id: ListenerId,
    fields: Arc<Mutex<Vec<String>>>,
    _subscription: Subscription,
}

/// Union of `incoming` and `known`, unique, with incoming names first.
fn union(incoming: &[String], known: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    incoming
        .iter()
        .chain(known)
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

impl FieldCatalog {
    /// Starts collecting field reports from `bus`. Reports addressed to
    /// anyone are accepted.
    pub fn new(bus: &EventBus) -> Self {
        let id = bus.allocate_listener_id();
        let listener = Listener::with_groups(id, [ALL]);
        let fields = Arc::new(Mutex::new(Vec::new()));

        let sink = fields.clone();
        let subscription = bus.register(&listener, FIELDS_CHANNEL, move |_, data, _| {
            let Some(all) = data.get("all").and_then(Value::as_array) else {
                return;
            };
            let incoming: Vec<String> = all
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            let mut known = sink.lock().unwrap_or_else(|p| p.into_inner());
            *known = union(&incoming, &known);
        });

        Self {
            id,
            fields,
            _subscription: subscription,
        }
    }

    pub fn listener_id(&self) -> ListenerId {
        self.id
    }

    pub fn list(&self) -> Vec<String> {
        self.fields
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
