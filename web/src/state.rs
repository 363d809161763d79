//! Application state for Axum handlers.

use std::fmt;
use std::sync::Arc;
use stockroom_core::InventoryService;
use stockroom_core::identity::IdentityDirectory;

/// Largest import file accepted when nothing else is configured (5 MB).
pub const DEFAULT_IMPORT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Room left in a request body for the non-file form fields.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    service: InventoryService,
    identities: Arc<dyn IdentityDirectory>,
    gateway_token: Arc<str>,
    import_max_bytes: usize,
}

impl AppState {
    /// Create the state.
    ///
    /// `gateway_token` is the secret the upstream gateway sends with every
    /// forwarded user id.
    pub fn new(
        service: InventoryService,
        identities: Arc<dyn IdentityDirectory>,
        gateway_token: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            service,
            identities,
            gateway_token: gateway_token.into(),
            import_max_bytes: DEFAULT_IMPORT_MAX_BYTES,
        }
    }

    /// Replace the import size limit.
    #[must_use]
    pub const fn with_import_max_bytes(mut self, import_max_bytes: usize) -> Self {
        self.import_max_bytes = import_max_bytes;
        self
    }

    /// The inventory service.
    #[must_use]
    pub const fn service(&self) -> &InventoryService {
        &self.service
    }

    /// Where caller roles are looked up.
    #[must_use]
    pub fn identities(&self) -> &dyn IdentityDirectory {
        self.identities.as_ref()
    }

    /// Shared secret of the gateway.
    #[must_use]
    pub fn gateway_token(&self) -> &str {
        &self.gateway_token
    }

    /// Largest accepted import file.
    #[must_use]
    pub const fn import_max_bytes(&self) -> usize {
        self.import_max_bytes
    }

    /// Largest accepted request body: the bigger of the two file limits
    /// plus room for the other fields.
    #[must_use]
    pub fn body_limit(&self) -> usize {
        self.import_max_bytes
            .max(self.service.upload_rules().max_bytes)
            .saturating_add(FORM_OVERHEAD_BYTES)
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("import_max_bytes", &self.import_max_bytes)
            .finish_non_exhaustive()
    }
}
