use estate_hub::access::AccessPolicy;
use estate_hub::clock::SystemClock;
use estate_hub::config::{AppConfig, RateLimitConfig};
use estate_hub::listings::Listing;
use estate_hub::moderation::{DeadlineNotifier, Notifier, NotifierError};
use estate_hub::ops::Marketplace;
use estate_hub::store::{FileBackend, RecordStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ApiNotifier = DeadlineNotifier<TracingNotifier>;
pub(crate) type ApiMarketplace = Marketplace<ApiNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) marketplace: Arc<ApiMarketplace>,
    pub(crate) search_limit: RateLimitConfig,
}

/// Stand-in for the chat-platform transport: every outbound message is written to the log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn publish_to_channel(&self, listing: &Listing) -> Result<(), NotifierError> {
        info!(
            target: "estate_hub_api::channel",
            listing_id = listing.id,
            title = %listing.title,
            price = listing.price,
            location = %listing.location,
            "listing published to channel"
        );
        Ok(())
    }

    fn notify_user(&self, user_id: u64, title: &str, message: &str) -> Result<(), NotifierError> {
        info!(target: "estate_hub_api::notify", user_id, title, message, "user notified");
        Ok(())
    }
}

/// Wires every core component to the configured data directory.
pub(crate) fn build_marketplace(config: &AppConfig) -> ApiMarketplace {
    let backend = Arc::new(FileBackend::new(config.storage.data_dir.clone()));
    let store = Arc::new(RecordStore::new(backend, Arc::new(SystemClock)));
    let notifier = DeadlineNotifier::new(
        Arc::new(TracingNotifier),
        config.moderation.notifier_timeout,
    );
    Marketplace::new(
        store,
        AccessPolicy::new(config.moderation.admin_ids.iter().copied()),
        Arc::new(notifier),
    )
}
