//! Event System
//!
//! Scoped publish/subscribe between independently rendered panels. Every
//! packet travels over one channel per event type; each registration filters
//! the packets of its channel down to the ones addressed to its listener.

use crate::consts::dash_consts::{ALL, DEBUG_CHANNEL, DEFAULT_GROUP};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Identity of an addressable listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(pub u64);

impl Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a packet's `to` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// A single listener.
    Listener(ListenerId),
    /// Every listener that belongs to the named group.
    Group(String),
    /// Every listener.
    All,
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Address::Listener(id) => serializer.serialize_u64(id.0),
            Address::Group(name) => serializer.serialize_str(name),
            Address::All => serializer.serialize_str(ALL),
        }
    }
}

impl Address {
    /// Group address; the reserved name `ALL` becomes [`Address::All`].
    pub fn group(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == ALL { Address::All } else { Address::Group(name) }
    }
}

impl From<ListenerId> for Address {
    fn from(id: ListenerId) -> Self {
        Address::Listener(id)
    }
}

impl From<&str> for Address {
    fn from(name: &str) -> Self {
        Address::group(name)
    }
}

/// The `to` list of a packet. Built from a single address or from many.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recipients(Vec<Address>);

impl Recipients {
    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }
}

impl From<Address> for Recipients {
    fn from(address: Address) -> Self {
        Recipients(vec![address])
    }
}

impl From<ListenerId> for Recipients {
    fn from(id: ListenerId) -> Self {
        Recipients(vec![Address::Listener(id)])
    }
}

impl From<&str> for Recipients {
    fn from(name: &str) -> Self {
        Recipients(vec![Address::group(name)])
    }
}

impl From<Vec<Address>> for Recipients {
    fn from(addresses: Vec<Address>) -> Self {
        Recipients(addresses)
    }
}

impl<const N: usize> From<[Address; N]> for Recipients {
    fn from(addresses: [Address; N]) -> Self {
        Recipients(addresses.into())
    }
}

/// A broadcast message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub from: ListenerId,
    pub to: Vec<Address>,
    pub data: Value,
}

/// Packet metadata handed to handlers alongside the payload.
///
/// `time` is only present on the debug channel; normal deliveries do not
/// republish it.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketMeta {
    pub time: Option<DateTime<Utc>>,
    pub to: Vec<Address>,
    pub from: ListenerId,
    pub kind: String,
}

/// An addressable consumer of bus notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub id: ListenerId,
    pub groups: Vec<String>,
}

impl Listener {
    /// Listener in the default `NONE` group.
    pub fn new(id: ListenerId) -> Self {
        Self {
            id,
            groups: vec![DEFAULT_GROUP.to_string()],
        }
    }

    pub fn with_groups<I, S>(id: ListenerId, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups: Vec<String> = groups.into_iter().map(Into::into).collect();
        if groups.is_empty() {
            return Self::new(id);
        }
        Self { id, groups }
    }

    /// Whether a packet from `from` addressed to `to` reaches this listener.
    ///
    /// A listener never hears its own broadcasts. Otherwise it is reached by
    /// group, by identity, or by `ALL` on either side.
    pub fn accepts(&self, from: ListenerId, to: &[Address]) -> bool {
        if from == self.id {
            return false;
        }
        let in_all_group = self.groups.iter().any(|g| g == ALL);
        in_all_group
            || to.iter().any(|address| match address {
                Address::All => true,
                Address::Listener(id) => *id == self.id,
                Address::Group(name) => self.groups.iter().any(|g| g == name),
            })
    }
}

/// What the transport carries on a channel.
#[derive(Debug, Clone)]
struct Notification {
    time: Option<DateTime<Utc>>,
    kind: String,
    from: ListenerId,
    to: Vec<Address>,
    data: Value,
}

type RawHandler = Arc<dyn Fn(&str, &Notification) + Send + Sync>;

/// Channel-per-type delivery underneath the bus.
#[derive(Default)]
struct Transport {
    /// Channel names that have been registered at least once.
    types: HashSet<String>,
    channels: HashMap<String, Vec<(u64, RawHandler)>>,
    next_handler: u64,
}

impl Transport {
    fn subscribe(&mut self, channel: &str, handler: RawHandler) -> u64 {
        self.types.insert(channel.to_string());
        self.next_handler += 1;
        let handler_id = self.next_handler;
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push((handler_id, handler));
        handler_id
    }

    fn unsubscribe(&mut self, channel: &str, handler_id: u64) {
        if let Some(handlers) = self.channels.get_mut(channel) {
            handlers.retain(|(id, _)| *id != handler_id);
            if handlers.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    fn handlers(&self, channel: &str) -> Vec<RawHandler> {
        self.channels
            .get(channel)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

fn lock(transport: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    transport.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scoped event bus shared by every panel and by the dashboard controller.
#[derive(Clone, Default)]
pub struct EventBus {
    transport: Arc<Mutex<Transport>>,
    next_listener: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a listener id unique to this bus.
    pub fn allocate_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Sends `data` on channel `kind` to the given recipients.
    ///
    /// When a debug listener has ever registered, the full packet is mirrored
    /// on the debug channel first.
    pub fn broadcast(
        &self,
        from: ListenerId,
        to: impl Into<Recipients>,
        kind: &str,
        data: Value,
    ) {
        let Recipients(to) = to.into();
        let packet = Packet {
            time: Utc::now(),
            kind: kind.to_string(),
            from,
            to,
            data,
        };

        let (debug_handlers, handlers) = {
            let transport = lock(&self.transport);
            let debug = if transport.types.contains(DEBUG_CHANNEL) {
                transport.handlers(DEBUG_CHANNEL)
            } else {
                Vec::new()
            };
            (debug, transport.handlers(kind))
        };

        log::trace!(
            "broadcast '{}' from {} to {} recipient(s), {} handler(s)",
            packet.kind,
            packet.from,
            packet.to.len(),
            handlers.len()
        );

        if !debug_handlers.is_empty() {
            let debug = Notification {
                time: Some(packet.time),
                kind: packet.kind.clone(),
                from: packet.from,
                to: packet.to.clone(),
                data: serde_json::to_value(&packet).unwrap_or(Value::Null),
            };
            for handler in &debug_handlers {
                handler(DEBUG_CHANNEL, &debug);
            }
        }

        let notification = Notification {
            time: None,
            kind: packet.kind,
            from: packet.from,
            to: packet.to,
            data: packet.data,
        };
        for handler in &handlers {
            handler(kind, &notification);
        }
    }

    /// Installs `handler` for packets of type `kind` addressed to `listener`.
    ///
    /// The registration lives as long as the returned [`Subscription`].
    pub fn register<F>(&self, listener: &Listener, kind: &str, handler: F) -> Subscription
    where
        F: Fn(&str, &Value, &PacketMeta) + Send + Sync + 'static,
    {
        let listener = listener.clone();
        let filtered: RawHandler = Arc::new(move |channel, notification| {
            if !listener.accepts(notification.from, &notification.to) {
                return;
            }
            let meta = PacketMeta {
                time: notification.time,
                to: notification.to.clone(),
                from: notification.from,
                kind: notification.kind.clone(),
            };
            handler(channel, &notification.data, &meta);
        });

        let handler_id = lock(&self.transport).subscribe(kind, filtered);
        Subscription {
            transport: Arc::downgrade(&self.transport),
            channel: kind.to_string(),
            handler_id,
        }
    }

    /// Whether `kind` has ever been registered on this bus.
    pub fn is_registered(&self, kind: &str) -> bool {
        lock(&self.transport).types.contains(kind)
    }
}

/// Registration handle; dropping it removes the handler.
#[must_use = "dropping the subscription unregisters the handler"]
pub struct Subscription {
    transport: Weak<Mutex<Transport>>,
    channel: String,
    handler_id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.upgrade() {
            lock(&transport).unsubscribe(&self.channel, self.handler_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter(bus: &EventBus, listener: &Listener, kind: &str) -> (Subscription, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let sub = bus.register(listener, kind, move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (sub, hits)
    }

    #[test]
    // Group members other than the sender receive; the sender never does.
    fn test_group_delivery_excludes_sender() {
        let bus = EventBus::new();
        let sender = Listener::with_groups(bus.allocate_listener_id(), ["G1"]);
        let member = Listener::with_groups(bus.allocate_listener_id(), ["G1"]);
        let outsider = Listener::with_groups(bus.allocate_listener_id(), ["G2"]);

        let (_s1, sender_hits) = counter(&bus, &sender, "t");
        let (_s2, member_hits) = counter(&bus, &member, "t");
        let (_s3, outsider_hits) = counter(&bus, &outsider, "t");

        bus.broadcast(sender.id, "G1", "t", json!({"x": 1}));

        assert_eq!(sender_hits.load(Ordering::SeqCst), 0);
        assert_eq!(member_hits.load(Ordering::SeqCst), 1);
        assert_eq!(outsider_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    // A listener in the ALL group hears everything except its own packets.
    fn test_all_group_and_all_address() {
        let bus = EventBus::new();
        let sender = bus.allocate_listener_id();
        let wildcard = Listener::with_groups(bus.allocate_listener_id(), [ALL]);
        let plain = Listener::new(bus.allocate_listener_id());

        let (_w, wildcard_hits) = counter(&bus, &wildcard, "t");
        let (_p, plain_hits) = counter(&bus, &plain, "t");

        bus.broadcast(sender, "G9", "t", Value::Null);
        assert_eq!(wildcard_hits.load(Ordering::SeqCst), 1);
        assert_eq!(plain_hits.load(Ordering::SeqCst), 0);

        bus.broadcast(sender, Address::All, "t", Value::Null);
        assert_eq!(wildcard_hits.load(Ordering::SeqCst), 2);
        assert_eq!(plain_hits.load(Ordering::SeqCst), 1);

        bus.broadcast(wildcard.id, Address::All, "t", Value::Null);
        assert_eq!(wildcard_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_direct_address_by_id() {
        let bus = EventBus::new();
        let sender = bus.allocate_listener_id();
        let target = Listener::new(bus.allocate_listener_id());
        let other = Listener::new(bus.allocate_listener_id());

        let (_t, target_hits) = counter(&bus, &target, "t");
        let (_o, other_hits) = counter(&bus, &other, "t");

        bus.broadcast(sender, vec![Address::from(target.id), "G5".into()], "t", Value::Null);
        assert_eq!(target_hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_receives_data_and_meta() {
        let bus = EventBus::new();
        let sender = bus.allocate_listener_id();
        let listener = Listener::new(bus.allocate_listener_id());
        let received = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&received);

        let _sub = bus.register(&listener, "query", move |channel, data, meta| {
            *slot.lock().unwrap() = Some((channel.to_string(), data.clone(), meta.clone()));
        });
        bus.broadcast(sender, "NONE", "query", json!({"q": "status:200"}));

        let (channel, data, meta) = received.lock().unwrap().take().unwrap();
        assert_eq!(channel, "query");
        assert_eq!(data, json!({"q": "status:200"}));
        assert_eq!(meta.from, sender);
        assert_eq!(meta.to, vec![Address::Group("NONE".to_string())]);
        assert_eq!(meta.kind, "query");
        assert!(meta.time.is_none());
    }

    #[test]
    // Packets are mirrored on the debug channel, with time, once a debug listener exists.
    fn test_debug_channel_mirrors_packets() {
        let bus = EventBus::new();
        let sender = bus.allocate_listener_id();
        let inspector = Listener::with_groups(bus.allocate_listener_id(), [ALL]);
        let panel = Listener::with_groups(bus.allocate_listener_id(), ["G1"]);
        let captured = Arc::new(Mutex::new(Vec::new()));
        let order = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&captured);
        let debug_order = Arc::clone(&order);
        let _debug = bus.register(&inspector, DEBUG_CHANNEL, move |_, data, meta| {
            sink.lock().unwrap().push((data.clone(), meta.time));
            debug_order.lock().unwrap().push("debug");
        });
        let panel_order = Arc::clone(&order);
        let _panel = bus.register(&panel, "histogram", move |_, _, _| {
            panel_order.lock().unwrap().push("histogram");
        });
        bus.broadcast(sender, "G1", "histogram", json!(42));

        assert_eq!(*order.lock().unwrap(), vec!["debug", "histogram"]);
        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (packet, time) = &captured[0];
        assert_eq!(packet["type"], json!("histogram"));
        assert_eq!(packet["data"], json!(42));
        assert_eq!(packet["to"], json!(["G1"]));
        assert!(time.is_some());
    }

    #[test]
    fn test_broadcast_without_listeners_is_noop() {
        let bus = EventBus::new();
        bus.broadcast(ListenerId(7), Address::All, "nobody", Value::Null);
        assert!(!bus.is_registered("nobody"));
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let bus = EventBus::new();
        let sender = bus.allocate_listener_id();
        let listener = Listener::new(bus.allocate_listener_id());
        let (sub, hits) = counter(&bus, &listener, "t");

        bus.broadcast(sender, Address::All, "t", Value::Null);
        drop(sub);
        bus.broadcast(sender, Address::All, "t", Value::Null);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    // Handlers may broadcast re-entrantly.
    fn test_handler_can_rebroadcast() {
        let bus = EventBus::new();
        let relay = Listener::new(bus.allocate_listener_id());
        let sink = Listener::new(bus.allocate_listener_id());
        let relay_bus = bus.clone();
        let relay_id = relay.id;

        let _r = bus.register(&relay, "ping", move |_, data, _| {
            relay_bus.broadcast(relay_id, Address::All, "pong", data.clone());
        });
        let (_s, pongs) = counter(&bus, &sink, "pong");

        bus.broadcast(ListenerId(0), Address::All, "ping", Value::Null);
        assert_eq!(pongs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_group_name_maps_to_wildcard() {
        assert_eq!(Address::group("ALL"), Address::All);
        assert_eq!(Address::from("G1"), Address::Group("G1".to_string()));
        assert_eq!(Listener::with_groups(ListenerId(1), Vec::<String>::new()).groups, vec!["NONE"]);
    }
}
