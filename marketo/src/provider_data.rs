//! State shared with every resource and data source once the provider is
//! configured

use crate::api::Client;
use std::fmt;
use std::sync::Arc;

/// Handed out as `provider_data`; all resources reuse one client and
/// therefore one token cache
#[derive(Clone)]
pub struct MarketoProviderData {
    pub client: Arc<Client>,
}

impl MarketoProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl fmt::Debug for MarketoProviderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketoProviderData")
            .field("endpoint", &self.client.base_url())
            .finish()
    }
}
