use std::sync::Arc;

use chrono_tz::Tz;
use porter_core::{Booker, Policy};
use porter_memory::Store;

/// Which external credentials were configured at startup. Booleans
/// only; the health endpoint never exposes values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialStatus {
    pub provider: bool,
    pub zoom: bool,
    pub google: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<Policy>,
    pub booker: Arc<Booker>,
    pub store: Store,
    /// Zone assumed for /api/schedule callers who omit one.
    pub client_zone: Tz,
    pub credentials: CredentialStatus,
}

impl AppState {
    pub fn new(
        policy: Arc<Policy>,
        booker: Arc<Booker>,
        store: Store,
        client_zone: Tz,
        credentials: CredentialStatus,
    ) -> Self {
        Self {
            policy,
            booker,
            store,
            client_zone,
            credentials,
        }
    }
}
