use billing::WebhookProcessor;
use database::Database;
use discovery_engine::{ContactDiscovery, TrendAnalyzer};
use llm_interface::IdeaGenerator;

pub struct AppState {
    pub db: Database,
    pub trends: TrendAnalyzer,
    pub contacts: ContactDiscovery,
    pub webhooks: WebhookProcessor,
    pub ideas: IdeaGenerator,
    /// Bearer key for the user-facing routes. `None` leaves them open.
    pub api_key: Option<String>,
}
