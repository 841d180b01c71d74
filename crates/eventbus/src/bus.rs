//! Totally-ordered, multi-channel publish/subscribe with replay from a
//! cursor. One bus per agent; the timeline it holds is that agent's
//! complete Progress/Control/Monitor history.

use agentrt_domain::{Bookmark, Channel, Event, EventEnvelope};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Minimum bounded buffer size for a subscriber's delivery channel.
const MIN_SUBSCRIBER_BUFFER: usize = 100;

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default, Clone)]
pub struct SubscribeOpts {
    pub since: Option<Bookmark>,
    pub kinds: Option<Vec<String>>,
    pub buffer: Option<usize>,
}

struct Subscriber {
    channels: HashSet<Channel>,
    kinds: Option<HashSet<String>>,
    tx: mpsc::Sender<EventEnvelope>,
}

impl Subscriber {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if !self.channels.contains(&envelope.channel) {
            return false;
        }
        match &self.kinds {
            Some(kinds) => kinds.contains(envelope.event.kind()),
            None => true,
        }
    }
}

struct HandlerEntry {
    kind: String,
    handler: Handler,
}

impl HandlerEntry {
    fn matches(&self, event: &Event) -> bool {
        self.kind == "*" || self.kind == event.kind()
    }
}

struct BusState {
    timeline: Vec<EventEnvelope>,
    subscribers: HashMap<u64, Subscriber>,
}

/// A live subscription. Dropping it does not unsubscribe — call
/// [`EventBus::unsubscribe`] explicitly, matching the external API's
/// separate `subscribe`/`unsubscribe` pair.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<EventEnvelope>,
}

#[derive(Clone)]
pub struct EventBus {
    state: Arc<RwLock<BusState>>,
    next_cursor: Arc<AtomicU64>,
    next_sub_id: Arc<AtomicU64>,
    control_handlers: Arc<RwLock<Vec<HandlerEntry>>>,
    monitor_handlers: Arc<RwLock<Vec<HandlerEntry>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BusState {
                timeline: Vec::new(),
                subscribers: HashMap::new(),
            })),
            next_cursor: Arc::new(AtomicU64::new(0)),
            next_sub_id: Arc::new(AtomicU64::new(0)),
            control_handlers: Arc::new(RwLock::new(Vec::new())),
            monitor_handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Atomically increments the cursor, appends to the timeline, and fans
    /// out to every matching subscriber. Fan-out never blocks: a full
    /// subscriber queue drops this event for that subscriber only.
    pub fn emit(&self, channel: Channel, event: Event) -> EventEnvelope {
        let cursor = self.next_cursor.fetch_add(1, Ordering::SeqCst) as i64;
        let envelope = EventEnvelope {
            cursor,
            bookmark: Bookmark::new(cursor),
            channel,
            event,
        };

        {
            let mut state = self.state.write();
            state.timeline.push(envelope.clone());
            for sub in state.subscribers.values() {
                if sub.matches(&envelope) && sub.tx.try_send(envelope.clone()).is_err() {
                    tracing::debug!(cursor = envelope.cursor, "subscriber queue full, dropping event");
                }
            }
        }

        self.dispatch_handlers(&envelope);
        envelope
    }

    fn dispatch_handlers(&self, envelope: &EventEnvelope) {
        let handlers = match envelope.channel {
            Channel::Control => &self.control_handlers,
            Channel::Monitor => &self.monitor_handlers,
            Channel::Progress => return,
        };
        let matching: Vec<Handler> = handlers
            .read()
            .iter()
            .filter(|h| h.matches(&envelope.event))
            .map(|h| h.handler.clone())
            .collect();
        let event = envelope.event.clone();
        for handler in matching {
            let event = event.clone();
            tokio::spawn(async move { handler(&event) });
        }
    }

    /// Returns a delivery channel with a bounded buffer. If `opts.since` is
    /// set, every envelope with `cursor > since.cursor` matching `channels`
    /// and `opts.kinds` is delivered before any newly-emitted event.
    pub fn subscribe(&self, channels: &[Channel], opts: SubscribeOpts) -> Subscription {
        let buffer = opts.buffer.unwrap_or(MIN_SUBSCRIBER_BUFFER).max(MIN_SUBSCRIBER_BUFFER);
        let (tx, rx) = mpsc::channel(buffer);
        let channel_set: HashSet<Channel> = channels.iter().copied().collect();
        let kind_set = opts.kinds.map(|k| k.into_iter().collect::<HashSet<_>>());

        let mut state = self.state.write();
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);

        if let Some(since) = opts.since {
            for envelope in &state.timeline {
                if envelope.cursor <= since.cursor || !channel_set.contains(&envelope.channel) {
                    continue;
                }
                if let Some(kinds) = &kind_set {
                    if !kinds.contains(envelope.event.kind()) {
                        continue;
                    }
                }
                let _ = tx.try_send(envelope.clone());
            }
        }

        state.subscribers.insert(
            id,
            Subscriber {
                channels: channel_set,
                kinds: kind_set,
                tx,
            },
        );

        Subscription { id, rx }
    }

    /// Idempotent: closes the delivery channel exactly once, a second call
    /// on the same id is a no-op.
    pub fn unsubscribe(&self, id: u64) {
        self.state.write().subscribers.remove(&id);
    }

    pub fn on_control(&self, kind: impl Into<String>, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.control_handlers.write().push(HandlerEntry {
            kind: kind.into(),
            handler: Arc::new(handler),
        });
    }

    pub fn on_monitor(&self, kind: impl Into<String>, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.monitor_handlers.write().push(HandlerEntry {
            kind: kind.into(),
            handler: Arc::new(handler),
        });
    }

    pub fn cursor(&self) -> i64 {
        self.next_cursor.load(Ordering::SeqCst) as i64
    }
}
