pub mod config;
pub mod embedder;
pub mod embedding_storage;
pub mod file_scanner;
mod http;
pub mod ollama_client;
pub mod openai_client;
pub mod providers;
pub mod search;
pub mod sources;
pub mod vector_store;
pub mod web_loader;
