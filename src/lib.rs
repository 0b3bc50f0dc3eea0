pub mod config;
pub mod dispatch;
pub mod llm;
pub mod probe;
pub mod transport;
