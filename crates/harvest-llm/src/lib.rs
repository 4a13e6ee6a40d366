// LLM and embedding runtimes shared by the worker and the agent.

pub mod chat;
pub mod embedder;

pub use chat::{ChatClient, ChatMessage, ChatOptions, LlmError, MessageRole, StreamEvent};
pub use embedder::{Embedder, EmbedderError, EMBEDDING_DIM};
