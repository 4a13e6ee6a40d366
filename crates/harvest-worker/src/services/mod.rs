// Shared service clients owned by the worker process.

pub mod api;
pub mod feed;
pub mod graph;
pub mod html;
pub mod translate;

use std::sync::Arc;

use crate::config::WorkerConfig;
use api::ApiClient;
use graph::GraphClient;
use harvest_llm::ChatClient;

/// Everything activities need, shared across the worker.
pub struct WorkerServices {
    pub config: WorkerConfig,
    pub api: ApiClient,
    pub graph: GraphClient,
    pub llm: ChatClient,
    /// Plain client for feeds, page fetches and GitHub.
    pub http: reqwest::Client,
}

pub type Services = Arc<WorkerServices>;

impl WorkerServices {
    pub fn from_config(config: WorkerConfig) -> Services {
        let api = ApiClient::new(&config.api_base_url, &config.internal_api_token);
        let graph = GraphClient::new(&config.graph_base_url, &config.internal_api_token);
        let llm = ChatClient::new(&config.openai_base_url, &config.openai_api_key);
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .user_agent(concat!("harvest-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build http client");
        Arc::new(WorkerServices {
            config,
            api,
            graph,
            llm,
            http,
        })
    }
}
