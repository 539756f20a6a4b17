// lib.rs - module exports
pub mod config;
pub mod embeddings;
pub mod handlers;
pub mod indexer_client;
pub mod llm_client;
pub mod rulebase;
pub mod verdict;
pub mod workflow;
pub mod ytdlp_client;

pub use config::AuditConfig;
pub use workflow::{AuditState, AuditWorkflow};
