//! The per-agent event bus: ordered, multi-channel, replayable.

mod bus;

pub use bus::{EventBus, SubscribeOpts, Subscription};
