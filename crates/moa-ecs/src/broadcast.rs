//! Throttled, fire-and-forget state broadcast to the host.
//!
//! The world offers its entity sequence to the [`Broadcaster`] once per
//! update. A [`ThrottlePolicy`] decides whether that update actually emits a
//! [`BroadcastMessage`]; emitted messages go to a [`HostChannel`].
//!
//! Delivery is best effort. Nothing is acknowledged, queued or retried: if
//! the channel rejects a message (host absent, receiver gone, write error)
//! it is logged at `debug` and dropped, and the next emission is again a
//! full snapshot.
//!
//! # Policies
//!
//! | Policy | Emits | Worst-case staleness |
//! |--------|-------|----------------------|
//! | [`Interval`](ThrottlePolicy::Interval) | update 1, then every N-th | N updates |
//! | [`Sampled`](ThrottlePolicy::Sampled) | each update with probability p | unbounded |
//! | [`OnChange`](ThrottlePolicy::OnChange) | when the snapshot digest changes, or every N | N updates |
//! | [`Always`](ThrottlePolicy::Always) | every update | none |

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::mpsc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::entity::Entity;
use crate::snapshot::{encode_entities, EntityData};
use crate::EcsError;

/// Message type tag of every state broadcast.
pub const MESSAGE_TYPE: &str = "MOA_ECS_UPDATE";

/// Updates between emissions under the default policy (about one second at
/// 60 updates per second).
pub const DEFAULT_BROADCAST_INTERVAL: u64 = 60;

// ---------------------------------------------------------------------------
// BroadcastMessage
// ---------------------------------------------------------------------------

/// `{ "type": "MOA_ECS_UPDATE", "entities": [...] }`
///
/// Each message is a complete snapshot; hosts should replace, not merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub entities: Vec<EntityData>,
}

impl BroadcastMessage {
    pub fn new(entities: Vec<EntityData>) -> Self {
        Self {
            message_type: MESSAGE_TYPE.to_owned(),
            entities,
        }
    }

    pub fn from_entities(entities: &[Entity]) -> Self {
        Self::new(encode_entities(entities))
    }

    pub fn to_json(&self) -> Result<String, EcsError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Host-side decoding of one incoming message.
///
/// Returns `None` for anything that is not a well-formed state broadcast,
/// mirroring how a host ignores unrelated messages.
pub fn parse_message(text: &str) -> Option<BroadcastMessage> {
    let message: BroadcastMessage = serde_json::from_str(text).ok()?;
    (message.message_type == MESSAGE_TYPE).then_some(message)
}

// ---------------------------------------------------------------------------
// ThrottlePolicy
// ---------------------------------------------------------------------------

/// How often the broadcaster actually emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ThrottlePolicy {
    /// Emit on the first update and then on every `every_ticks`-th update.
    Interval { every_ticks: u64 },
    /// Emit each update with the given probability, drawn from a PRNG seeded
    /// with `seed` so sessions are reproducible.
    Sampled { probability: f64, seed: u64 },
    /// Emit whenever the encoded snapshot differs from the last emitted one,
    /// and at least every `heartbeat_ticks` updates.
    OnChange { heartbeat_ticks: u64 },
    /// Emit on every update.
    Always,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        ThrottlePolicy::Interval {
            every_ticks: DEFAULT_BROADCAST_INTERVAL,
        }
    }
}

impl ThrottlePolicy {
    /// Check the policy parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ThrottlePolicy::Interval { every_ticks: 0 } => {
                Err("interval broadcast needs every_ticks >= 1".to_owned())
            }
            ThrottlePolicy::OnChange { heartbeat_ticks: 0 } => {
                Err("on_change broadcast needs heartbeat_ticks >= 1".to_owned())
            }
            ThrottlePolicy::Sampled { probability, .. } if !(0.0..=1.0).contains(probability) => {
                Err(format!(
                    "sampled broadcast probability must be within [0, 1], got {probability}"
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Result of offering one update to the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// A message was handed to the channel.
    Emitted,
    /// The policy skipped this update.
    Throttled,
    /// A message was built but the channel rejected it; it is gone.
    Dropped,
}

// ---------------------------------------------------------------------------
// HostChannel
// ---------------------------------------------------------------------------

/// Outbound path to the host. Must never block on a slow consumer.
pub trait HostChannel {
    fn post(&mut self, message: &BroadcastMessage) -> Result<(), EcsError>;
}

impl<T: HostChannel + ?Sized> HostChannel for Box<T> {
    fn post(&mut self, message: &BroadcastMessage) -> Result<(), EcsError> {
        (**self).post(message)
    }
}

/// No host attached. Every post fails and is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChannel;

impl HostChannel for NullChannel {
    fn post(&mut self, _message: &BroadcastMessage) -> Result<(), EcsError> {
        Err(EcsError::Channel("no host attached".to_owned()))
    }
}

/// Shared view of the messages an in-process host has received.
#[derive(Debug, Clone, Default)]
pub struct HostInbox {
    messages: Rc<RefCell<Vec<BroadcastMessage>>>,
}

impl HostInbox {
    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    /// Most recent snapshot, which is all a host ever needs.
    pub fn last(&self) -> Option<BroadcastMessage> {
        self.messages.borrow().last().cloned()
    }

    pub fn messages(&self) -> Vec<BroadcastMessage> {
        self.messages.borrow().clone()
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<BroadcastMessage> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }
}

/// Delivers into a [`HostInbox`] on the same thread.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    inbox: HostInbox,
}

impl MemoryChannel {
    /// A channel and the inbox it delivers to.
    pub fn new() -> (Self, HostInbox) {
        let inbox = HostInbox::default();
        (
            Self {
                inbox: inbox.clone(),
            },
            inbox,
        )
    }
}

impl HostChannel for MemoryChannel {
    fn post(&mut self, message: &BroadcastMessage) -> Result<(), EcsError> {
        self.inbox.messages.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// Sends JSON text to a host running on another thread. `send` on an
/// unbounded channel never blocks; a dropped receiver is a failed post.
impl HostChannel for mpsc::Sender<String> {
    fn post(&mut self, message: &BroadcastMessage) -> Result<(), EcsError> {
        let text = message.to_json()?;
        self.send(text)
            .map_err(|_| EcsError::Channel("host receiver dropped".to_owned()))
    }
}

/// Writes one JSON document per line, e.g. to stdout for a parent process.
#[derive(Debug)]
pub struct JsonLinesChannel<W> {
    writer: W,
}

impl<W: Write> JsonLinesChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> HostChannel for JsonLinesChannel<W> {
    fn post(&mut self, message: &BroadcastMessage) -> Result<(), EcsError> {
        let text = message.to_json()?;
        writeln!(self.writer, "{text}")
            .and_then(|_| self.writer.flush())
            .map_err(|e| EcsError::Channel(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Applies a [`ThrottlePolicy`] and posts emitted snapshots to a channel.
pub struct Broadcaster {
    policy: ThrottlePolicy,
    channel: Box<dyn HostChannel>,
    rng: Pcg64,
    offered: u64,
    emitted: u64,
    last_emit_at: Option<u64>,
    last_digest: Option<blake3::Hash>,
}

impl Broadcaster {
    pub fn new(policy: ThrottlePolicy, channel: impl HostChannel + 'static) -> Self {
        let seed = match &policy {
            ThrottlePolicy::Sampled { seed, .. } => *seed,
            _ => 0,
        };
        Self {
            policy,
            channel: Box::new(channel),
            rng: Pcg64::seed_from_u64(seed),
            offered: 0,
            emitted: 0,
            last_emit_at: None,
            last_digest: None,
        }
    }

    /// Default policy, no host.
    pub fn disconnected() -> Self {
        Self::new(ThrottlePolicy::default(), NullChannel)
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// Replace the channel, keeping throttle state.
    pub fn set_channel(&mut self, channel: impl HostChannel + 'static) {
        self.channel = Box::new(channel);
    }

    /// Updates offered so far.
    pub fn offered_count(&self) -> u64 {
        self.offered
    }

    /// Messages handed to the channel successfully.
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }

    /// Forget all throttle state, as if no update had been offered yet. The
    /// channel is kept.
    pub fn reset(&mut self) {
        let seed = match &self.policy {
            ThrottlePolicy::Sampled { seed, .. } => *seed,
            _ => 0,
        };
        self.rng = Pcg64::seed_from_u64(seed);
        self.offered = 0;
        self.emitted = 0;
        self.last_emit_at = None;
        self.last_digest = None;
    }

    /// Offer one update's entity sequence.
    pub fn broadcast(&mut self, entities: &[Entity]) -> BroadcastOutcome {
        self.offered += 1;
        let tick = self.offered;

        let message = match self.policy {
            ThrottlePolicy::Always => BroadcastMessage::from_entities(entities),
            ThrottlePolicy::Interval { every_ticks } => {
                if (tick - 1) % every_ticks.max(1) != 0 {
                    return BroadcastOutcome::Throttled;
                }
                BroadcastMessage::from_entities(entities)
            }
            ThrottlePolicy::Sampled { probability, .. } => {
                if self.rng.gen::<f64>() >= probability {
                    return BroadcastOutcome::Throttled;
                }
                BroadcastMessage::from_entities(entities)
            }
            ThrottlePolicy::OnChange { heartbeat_ticks } => {
                let message = BroadcastMessage::from_entities(entities);
                let digest = match serde_json::to_vec(&message.entities) {
                    Ok(bytes) => blake3::hash(&bytes),
                    Err(e) => {
                        warn!(error = %e, tick, "failed to encode snapshot for change detection");
                        return BroadcastOutcome::Dropped;
                    }
                };
                let changed = self.last_digest != Some(digest);
                let heartbeat_due = self
                    .last_emit_at
                    .map_or(true, |at| tick - at >= heartbeat_ticks.max(1));
                if !changed && !heartbeat_due {
                    return BroadcastOutcome::Throttled;
                }
                self.last_digest = Some(digest);
                message
            }
        };

        self.last_emit_at = Some(tick);
        match self.channel.post(&message) {
            Ok(()) => {
                self.emitted += 1;
                trace!(tick, entities = message.entities.len(), "state broadcast emitted");
                BroadcastOutcome::Emitted
            }
            Err(e) => {
                debug!(error = %e, tick, "state broadcast dropped");
                BroadcastOutcome::Dropped
            }
        }
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("policy", &self.policy)
            .field("offered", &self.offered)
            .field("emitted", &self.emitted)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
