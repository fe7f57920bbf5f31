pub mod generator;
pub mod rag_service;
pub mod retriever;
