//! Typed event dispatch to registered listeners.
//!
//! Every inbound message fans out to the `event` wildcard topic and to
//! its exact `event:<type>` topic. Lifecycle notifications (online,
//! offline and its flavors, sequence mismatches) use dedicated topics.
//! Dispatch is never gated on handshake completion: a message read off
//! the socket is delivered immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use huddle_protocol::{CloseEvent, InboundMessage};

/// A subscription topic.
///
/// Known categories are modeled explicitly; arbitrary event types
/// remain an open extension point via [`Topic::EventType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every inbound message.
    Event,
    /// Messages with this exact event type (`event:<type>`).
    EventType(String),
    /// The connection came up.
    Online,
    /// The connection went down, for any reason.
    Offline,
    /// Transient close; an automatic reconnect follows.
    OfflineTransient,
    /// Terminal close; no retry.
    OfflinePermanent,
    /// Another session took over the channel; no retry.
    OfflineReplaced,
    /// Sequence discontinuity detected.
    SequenceMismatch,
}

impl Topic {
    /// Parses a topic from its string name.
    ///
    /// `event` is the wildcard, `event:<type>` an exact subscription.
    /// Unrecognized names are treated as bare event types, keeping the
    /// topic space open.
    pub fn parse(name: &str) -> Topic {
        match name {
            "event" => Topic::Event,
            "online" => Topic::Online,
            "offline" => Topic::Offline,
            "offline.transient" => Topic::OfflineTransient,
            "offline.permanent" => Topic::OfflinePermanent,
            "offline.replaced" => Topic::OfflineReplaced,
            "sequence-mismatch" => Topic::SequenceMismatch,
            other => match other.strip_prefix("event:") {
                Some(event_type) => Topic::EventType(event_type.to_string()),
                None => Topic::EventType(other.to_string()),
            },
        }
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Topic::parse(name)
    }
}

/// Which flavor of offline a close was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineKind {
    /// Caller-initiated disconnect.
    Local,
    /// Transient close; reconnection is underway.
    Transient,
    /// Terminal close.
    Permanent,
    /// Session superseded by another client.
    Replaced,
}

/// What a listener receives.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// An inbound envelope.
    Message(Arc<InboundMessage>),
    /// The connection came up.
    Online,
    /// The connection went down.
    Offline {
        close: CloseEvent,
        kind: OfflineKind,
    },
    /// A sequence discontinuity was observed; the message itself was
    /// still delivered.
    SequenceMismatch { expected: u64, observed: u64 },
}

/// Handle identifying one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Fans events out to registered listeners.
///
/// Listener callbacks run on the connection task and must not block;
/// long-running work belongs on a spawned task. Removing a listener
/// from inside a callback is safe: dispatch snapshots the listener set
/// before invoking anything.
pub struct EventRouter {
    binding_prefix: Option<String>,
    listeners: Mutex<HashMap<Topic, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventRouter {
    /// Creates a router, optionally scoped to a binding prefix.
    pub fn new(binding_prefix: Option<String>) -> Self {
        Self {
            binding_prefix,
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener for a topic. Multiple listeners per topic
    /// are allowed; all matching listeners are invoked per event.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, callback: F) -> ListenerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().expect("router lock poisoned");
        listeners
            .entry(topic.into())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, topic: impl Into<Topic>, id: ListenerId) -> bool {
        let topic = topic.into();
        let mut listeners = self.listeners.lock().expect("router lock poisoned");
        match listeners.get_mut(&topic) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(entry_id, _)| *entry_id != id);
                let removed = entries.len() < before;
                if entries.is_empty() {
                    listeners.remove(&topic);
                }
                removed
            }
            None => false,
        }
    }

    /// Dispatches one inbound message to the wildcard and exact topics.
    ///
    /// On a multiplexed channel, messages outside the binding namespace
    /// are dropped and the prefix is stripped from matching ones before
    /// topic lookup.
    pub fn dispatch_message(&self, mut message: InboundMessage) {
        if let Some(prefix) = &self.binding_prefix {
            let qualified = format!("{prefix}.");
            match message.data.event_type.strip_prefix(&qualified) {
                Some(stripped) => {
                    message.data.event_type = stripped.to_string();
                }
                None => {
                    debug!(
                        event_type = %message.data.event_type,
                        prefix = %prefix,
                        "dropping message outside binding namespace"
                    );
                    return;
                }
            }
        }

        let exact = Topic::EventType(message.data.event_type.clone());
        let event = ChannelEvent::Message(Arc::new(message));
        self.notify(&Topic::Event, &event);
        self.notify(&exact, &event);
    }

    /// Notifies online listeners.
    pub fn emit_online(&self) {
        self.notify(&Topic::Online, &ChannelEvent::Online);
    }

    /// Notifies offline listeners: always the `offline` wildcard, plus
    /// the flavor topic for unsolicited closes.
    pub fn emit_offline(&self, close: CloseEvent, kind: OfflineKind) {
        let event = ChannelEvent::Offline { close, kind };
        self.notify(&Topic::Offline, &event);
        let flavor = match kind {
            OfflineKind::Local => None,
            OfflineKind::Transient => Some(Topic::OfflineTransient),
            OfflineKind::Permanent => Some(Topic::OfflinePermanent),
            OfflineKind::Replaced => Some(Topic::OfflineReplaced),
        };
        if let Some(topic) = flavor {
            self.notify(&topic, &event);
        }
    }

    /// Notifies sequence-mismatch listeners.
    pub fn emit_sequence_mismatch(&self, expected: u64, observed: u64) {
        self.notify(
            &Topic::SequenceMismatch,
            &ChannelEvent::SequenceMismatch { expected, observed },
        );
    }

    fn notify(&self, topic: &Topic, event: &ChannelEvent) {
        // Snapshot under the lock, invoke outside it, so callbacks can
        // subscribe/unsubscribe without deadlocking or invalidating
        // iteration.
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.lock().expect("router lock poisoned");
            match listeners.get(topic) {
                Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return,
            }
        };

        for listener in snapshot {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("binding_prefix", &self.binding_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::EventData;
    use std::sync::atomic::AtomicUsize;

    fn message(event_type: &str) -> InboundMessage {
        InboundMessage::new("m-1", EventData::new(event_type))
    }

    fn counter_listener(count: &Arc<AtomicUsize>) -> impl Fn(&ChannelEvent) + Send + Sync + use<> {
        let count = Arc::clone(count);
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wildcard_and_exact_both_fire() {
        let router = EventRouter::new(None);
        let wildcard = Arc::new(AtomicUsize::new(0));
        let exact = Arc::new(AtomicUsize::new(0));
        let other = Arc::new(AtomicUsize::new(0));

        router.subscribe("event", counter_listener(&wildcard));
        router.subscribe("event:post", counter_listener(&exact));
        router.subscribe("event:delete", counter_listener(&other));

        router.dispatch_message(message("post"));

        assert_eq!(wildcard.load(Ordering::SeqCst), 1);
        assert_eq!(exact.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn multiple_listeners_per_topic() {
        let router = EventRouter::new(None);
        let count = Arc::new(AtomicUsize::new(0));
        router.subscribe("event", counter_listener(&count));
        router.subscribe("event", counter_listener(&count));

        router.dispatch_message(message("post"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let router = EventRouter::new(None);
        let count = Arc::new(AtomicUsize::new(0));
        let id = router.subscribe("event", counter_listener(&count));

        router.dispatch_message(message("post"));
        assert!(router.unsubscribe("event", id));
        router.dispatch_message(message("post"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!router.unsubscribe("event", id));
    }

    #[test]
    fn unsubscribe_from_within_dispatch() {
        let router = Arc::new(EventRouter::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let router_inner = Arc::clone(&router);
        let count_inner = Arc::clone(&count);
        // The listener removes itself on first delivery.
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let id_slot_inner = Arc::clone(&id_slot);
        let id = router.subscribe("event", move |_| {
            count_inner.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *id_slot_inner.lock().unwrap() {
                router_inner.unsubscribe("event", id);
            }
        });
        *id_slot.lock().unwrap() = Some(id);

        router.dispatch_message(message("post"));
        router.dispatch_message(message("post"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn binding_prefix_strips_and_filters() {
        let router = EventRouter::new(Some("board".to_string()));
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = Arc::clone(&seen);
        router.subscribe("event", move |event| {
            if let ChannelEvent::Message(m) = event {
                seen_inner.lock().unwrap().push(m.data.event_type.clone());
            }
        });
        let exact = Arc::new(AtomicUsize::new(0));
        router.subscribe("event:post", counter_listener(&exact));

        router.dispatch_message(message("board.post"));
        router.dispatch_message(message("other.post"));
        router.dispatch_message(message("post"));

        assert_eq!(*seen.lock().unwrap(), vec!["post".to_string()]);
        assert_eq!(exact.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn offline_flavors() {
        let router = EventRouter::new(None);
        let any = Arc::new(AtomicUsize::new(0));
        let transient = Arc::new(AtomicUsize::new(0));
        let replaced = Arc::new(AtomicUsize::new(0));
        router.subscribe("offline", counter_listener(&any));
        router.subscribe("offline.transient", counter_listener(&transient));
        router.subscribe("offline.replaced", counter_listener(&replaced));

        router.emit_offline(CloseEvent::from_code(1006), OfflineKind::Transient);
        router.emit_offline(CloseEvent::from_code(4000), OfflineKind::Replaced);
        router.emit_offline(CloseEvent::from_code(1000), OfflineKind::Local);

        assert_eq!(any.load(Ordering::SeqCst), 3);
        assert_eq!(transient.load(Ordering::SeqCst), 1);
        assert_eq!(replaced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn topic_parse() {
        assert_eq!(Topic::parse("event"), Topic::Event);
        assert_eq!(
            Topic::parse("event:post"),
            Topic::EventType("post".to_string())
        );
        assert_eq!(Topic::parse("online"), Topic::Online);
        assert_eq!(Topic::parse("offline.permanent"), Topic::OfflinePermanent);
        assert_eq!(Topic::parse("sequence-mismatch"), Topic::SequenceMismatch);
        // Unrecognized names stay usable as bare event types.
        assert_eq!(
            Topic::parse("custom.thing"),
            Topic::EventType("custom.thing".to_string())
        );
    }
}
