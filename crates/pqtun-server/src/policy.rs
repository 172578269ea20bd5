//! Per-user collaborators the server consults after the handshake but before
//! dialing: which protocols a client may request.

/// Decides whether a client may request the given protocol (`"tcp"` or
/// `"udp"`, case as sent on the wire). Implementations must be safe to call
/// concurrently from many connection tasks.
pub trait ProtocolPolicy: Send + Sync {
    fn allows(&self, client_id: &[u8], net: &str) -> bool;
}

/// Allows every client the same fixed set of protocol names.
pub struct AllowList {
    allowed: Vec<String>,
}

impl AllowList {
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl ProtocolPolicy for AllowList {
    fn allows(&self, _client_id: &[u8], net: &str) -> bool {
        self.allowed.iter().any(|a| a.eq_ignore_ascii_case(net))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_case_insensitive() {
        let policy = AllowList::new(["tcp", "udp"]);
        assert!(policy.allows(b"alice", "tcp"));
        assert!(policy.allows(b"alice", "TCP"));
        assert!(!policy.allows(b"alice", "icmp"));
    }
}
