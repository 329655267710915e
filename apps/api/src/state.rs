use std::sync::Arc;

use crate::extraction::DocumentExtractor;
use crate::profiles::store::ProfileStore;
use crate::provisioning::Provisioner;
use crate::session::IdentityVerifier;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Verifies bearer tokens for the `SessionContext` extractor.
    pub identity: Arc<dyn IdentityVerifier>,
    /// Used directly by the extraction preview endpoint.
    pub extractor: Arc<dyn DocumentExtractor>,
    /// Read side for the unauthenticated public listing.
    pub profiles: Arc<dyn ProfileStore>,
    pub provisioner: Arc<Provisioner>,
}
