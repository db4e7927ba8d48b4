use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::gateway::PaymentGateway;
use crate::services::meetings::MeetingProvider;
use crate::services::notifications::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Notifier,
    /// `None` when no video provider is configured.
    pub meetings: Option<Arc<dyn MeetingProvider>>,
}
