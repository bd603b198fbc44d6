use std::{borrow::Cow, future::Future};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contact::Contact;
use crate::id::Id;

/// Object able to probe remote peers
// Should use some sort of interior mutability and Refcounting
// You must be able to send a Transport copy between boundaries! (Send)
pub trait TransportSender: Clone + Send {
    /// Future returned by a liveness probe.
    type Fut: Future<Output = Result<(), TransportError>> + Send;

    /// Probes a peer and resolves once it answers or the transport gives
    /// up on it. A timeout failure carries the probed peer's id so that
    /// late continuations can tell which entry went stale.
    fn ping(&self, target: &Contact) -> Self::Fut;
}

/// Callbacks the transport drives into the owning node.
pub trait TransportListener {
    /// Returns true only if the peer was taken into the routing table.
    fn on_connect(&self, contact: Contact) -> impl Future<Output = bool> + Send;

    fn on_disconnect(&self, id: Id) -> impl Future<Output = ()> + Send;

    fn on_request(&self, sender: Id, request: Request) -> impl Future<Output = Response> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Request {
    FindNodes(Id),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Response {
    FoundNodes(Vec<Contact>),
}

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The peer with this id did not answer in time.
    #[error("ping to {0} timed out")]
    Timeout(Id),

    /// The probe was abandoned, e.g. because the node is shutting down.
    /// Equivalent to a failure that must cause no table mutation.
    #[error("ping was cancelled")]
    Cancelled,

    #[error("unknown transport error {0}")]
    Unknown(Cow<'static, str>),
}

impl From<&'static str> for TransportError {
    fn from(x: &'static str) -> Self {
        TransportError::Unknown(Cow::Borrowed(x))
    }
}

impl From<String> for TransportError {
    fn from(x: String) -> Self {
        TransportError::Unknown(Cow::Owned(x))
    }
}
