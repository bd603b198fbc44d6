use std::fmt;

use crate::id::Id;

/// Where a peer can be reached. Compared by value, a peer may rebind
/// to a new address while keeping its id.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        PeerAddr {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A known remote peer.
///
/// Identity is the id alone: two contacts with the same id are the same
/// peer even when their addresses differ.
#[derive(Clone, Debug, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contact {
    pub id: Id,
    pub address: PeerAddr,
    /// Consecutive failed RPCs, zeroed whenever the peer is (re)inserted.
    pub failed_rpcs: u32,
}

impl Contact {
    pub fn new(id: Id, address: PeerAddr) -> Self {
        Contact {
            id,
            address,
            failed_rpcs: 0,
        }
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::ID_LEN;

    #[test]
    fn identity_is_by_id() {
        let id = Id([3; ID_LEN]);
        let a = Contact::new(id, PeerAddr::new("10.0.0.1", 1234));
        let b = Contact::new(id, PeerAddr::new("10.0.0.2", 5678));
        assert_eq!(a, b);
        let c = Contact::new(Id([4; ID_LEN]), a.address.clone());
        assert_ne!(a, c);
    }
}
