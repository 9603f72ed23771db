//! Change events and observer subscriptions.
//!
//! Every mutation of a member node runs one four-phase cycle on a single
//! call stack:
//!
//! 1. [`NodeEvent::Prepare`] - listeners tear down subscriptions the change
//!    will orphan (the mutation has not applied yet)
//! 2. [`NodeEvent::Changing`] - relayed to observers, still pre-mutation
//! 3. the mutation applies
//! 4. [`NodeEvent::Finalize`] - listeners rebuild subscriptions over the new
//!    structure, then [`NodeEvent::Changed`] is relayed post-mutation
//!
//! Observers receive a [`ChangeEvent`] and nothing else. Without a graph
//! handle a callback cannot start a nested mutation, so the cycle never
//! reenters.

use slotmap::new_key_type;

use crate::index::Index;
use crate::listener::ListenerId;
use crate::node::{ChangeKind, NodeId};
use crate::path::NodePath;
use crate::value::NodeValue;

new_key_type! {
    /// Unique identifier for a stored observer callback.
    pub struct CallbackId;
}

/// The four points of a member node's change-event contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// Before the mutation applies; listeners unregister doomed nodes here.
    Prepare,
    /// Relayed to observers just before the mutation applies.
    Changing,
    /// After the mutation applies; listeners register newly reachable nodes.
    Finalize,
    /// Relayed to observers just after the mutation applies.
    Changed,
}

/// A change on a member node, as delivered to observers.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    /// The member node the mutation ran on.
    pub node: NodeId,
    /// How the mutation is classified.
    pub kind: ChangeKind,
    /// The index as reported by the mutator. Empty for whole-value changes
    /// and for adds that let the collection pick the position.
    pub index: Index,
    /// Resolved content before the change; [`NodeValue::Null`] when the
    /// change had no prior value (adds).
    pub old_value: NodeValue,
    /// Resolved content after the change; [`NodeValue::Null`] for removes.
    pub new_value: NodeValue,
    /// Canonical path of the mutated member, extended by the index when one
    /// was reported.
    pub path: NodePath,
}

/// Receipt for one observer subscription.
///
/// Returned by [`NodeGraph::observe`](crate::NodeGraph::observe) and the
/// listener relay methods; pass it to
/// [`NodeGraph::unobserve`](crate::NodeGraph::unobserve) to release the
/// subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub(crate) id: CallbackId,
}

/// Boxed observer callback.
pub(crate) type ObserverFn = Box<dyn Fn(&ChangeEvent)>;

/// Where a stored callback is attached, so releasing the callback can also
/// detach it.
pub(crate) enum CallbackAnchor {
    /// Direct subscription on one node, firing for one event kind.
    Node { node: NodeId, event: NodeEvent },
    /// Relay subscription on a listener's Changing side.
    ListenerChanging(ListenerId),
    /// Relay subscription on a listener's Changed side.
    ListenerChanged(ListenerId),
}

/// Arena slot for one stored callback.
pub(crate) struct CallbackEntry {
    pub anchor: CallbackAnchor,
    pub callback: ObserverFn,
}
