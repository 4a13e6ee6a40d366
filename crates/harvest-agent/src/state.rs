// Shared application state.

use std::sync::Arc;

use harvest_durable::Client;
use harvest_llm::ChatClient;
use tracing::warn;

use crate::config::AgentSettings;
use crate::services::entry::EntryService;
use crate::services::search::SearchService;
use crate::services::vector::VectorSearchService;

pub struct AgentState {
    pub settings: AgentSettings,
    pub llm: ChatClient,
    pub entries: EntryService,
    pub search: SearchService,
    pub vector: VectorSearchService,
    /// Connection to the durable engine, for fire-and-forget evaluation.
    /// None when the engine was unreachable at startup.
    pub engine: Option<Client>,
}

pub type SharedState = Arc<AgentState>;

impl AgentState {
    pub async fn from_settings(settings: AgentSettings) -> SharedState {
        let llm = ChatClient::new(&settings.openai_base_url, &settings.openai_api_key);
        let entries = EntryService::new(&settings.api_base_url, &settings.internal_api_token);
        let search = SearchService::new(&settings.api_base_url, &settings.internal_api_token);
        let vector = VectorSearchService::new(
            &settings.api_base_url,
            &settings.internal_api_token,
            &settings.embedding_model,
        );

        let engine = match Client::connect(&settings.temporal_host, &settings.temporal_namespace)
            .await
        {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "durable engine unreachable; evaluation submission disabled");
                None
            }
        };

        Arc::new(AgentState {
            settings,
            llm,
            entries,
            search,
            vector,
            engine,
        })
    }
}
