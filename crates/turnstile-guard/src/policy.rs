//! Peer admission policy and the engine-facing callback trait.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::{AuthKey, CredentialIndex};

/// The strategy interface the external relay engine holds.
///
/// One method per callback contract: `auth_key` during long-term
/// credential authentication, `admit_peer` before a permission or
/// channel bind is granted. Implementations must be `Send + Sync`; the
/// engine invokes them concurrently, one call per inbound request.
pub trait RelayGuard: Send + Sync {
    /// Return the authentication key for `username`, or `None` to deny.
    fn auth_key(&self, username: &str, realm: &str, src_addr: SocketAddr) -> Option<AuthKey>;

    /// Whether `client_addr` may establish a permission to reach `peer_ip`.
    fn admit_peer(&self, client_addr: &str, peer_ip: IpAddr) -> bool;
}

/// Extract the host portion of a textual transport address that is not
/// a well-formed socket address: take everything before the first `:`,
/// or the whole string when no colon exists.
fn client_host_fallback(client_addr: &str) -> &str {
    match client_addr.split_once(':') {
        Some((host, _)) => host,
        None => client_addr,
    }
}

/// The same-address admission rule, as a pure function.
///
/// A client may only establish a permission toward its own apparent
/// address (host or server-reflexive, as the relay sees it). That lets
/// connectivity self-tests relay back to the client while refusing to
/// relay toward arbitrary third parties.
pub fn same_address_admission(client_addr: &str, peer_ip: IpAddr) -> bool {
    // Parse the whole address when possible and compare IPs, so
    // bracketed and non-canonical IPv6 literals are handled correctly.
    if let Ok(addr) = client_addr.parse::<SocketAddr>() {
        return addr.ip() == peer_ip;
    }
    // Textual comparison otherwise: a degenerate client host never
    // matches any peer IP, so malformed input degrades to a deny.
    client_host_fallback(client_addr) == peer_ip.to_string()
}

/// [`RelayGuard`] implementation backed by a shared [`CredentialIndex`].
pub struct GuardPolicy {
    credentials: Arc<CredentialIndex>,
}

impl GuardPolicy {
    pub fn new(credentials: Arc<CredentialIndex>) -> Self {
        Self { credentials }
    }
}

impl RelayGuard for GuardPolicy {
    fn auth_key(&self, username: &str, _realm: &str, src_addr: SocketAddr) -> Option<AuthKey> {
        match self.credentials.lookup(username) {
            Some(key) => {
                debug!(username, %src_addr, "authentication key found");
                Some(key.clone())
            }
            None => {
                warn!(username, %src_addr, "unknown user, denying authentication");
                None
            }
        }
    }

    fn admit_peer(&self, client_addr: &str, peer_ip: IpAddr) -> bool {
        let admitted = same_address_admission(client_addr, peer_ip);
        if admitted {
            info!(client = client_addr, peer = %peer_ip, "admitting permission request");
        } else {
            info!(client = client_addr, peer = %peer_ip, "blocking permission request");
        }
        admitted
    }
}
