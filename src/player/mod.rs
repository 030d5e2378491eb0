pub mod error;
pub mod mock;
pub mod traits;
pub mod web_api;

use std::sync::Arc;

pub use error::{ProviderError, ProviderResult};
pub use mock::MockProvider;
pub use traits::{EventSink, PlaybackProvider, PlayerCommand, PlayerState, ProviderEvent};
pub use web_api::{WebApiConfig, WebApiProvider};

/// Factory to get the provider the host asked for
pub fn get_provider(offline: bool, config: WebApiConfig, client: reqwest::Client) -> Arc<dyn PlaybackProvider> {
    if offline {
        Arc::new(MockProvider::demo())
    } else {
        Arc::new(WebApiProvider::new(config, client))
    }
}
