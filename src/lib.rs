pub mod answer;
pub mod api;
pub mod chunking;
pub mod config;
pub mod context;
pub mod data_models;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod relevant;
pub mod scrapper;
pub mod sources;
