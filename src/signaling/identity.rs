use rand::{Rng, distributions::Alphanumeric};

use crate::signaling::protocol::ConnectionId;

pub const DEFAULT_IDENTITY_LEN: usize = 20;

/// Mints opaque connection identities (random alphanumerics).
///
/// Uniqueness among live connections is enforced by the registry, not here;
/// the coordinator re-mints on collision.
#[derive(Debug, Clone, Copy)]
pub struct IdentityMinter {
    len: usize,
}

impl IdentityMinter {
    pub fn new(len: usize) -> Self {
        Self { len: len.max(1) }
    }

    pub fn mint(&self) -> ConnectionId {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.len)
            .map(char::from)
            .collect()
    }
}

impl Default for IdentityMinter {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_LEN)
    }
}
