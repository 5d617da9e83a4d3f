pub mod config;
pub mod generator;
pub mod ingest;
pub mod models;
pub mod render;
pub mod service;
pub mod summary;
pub mod tasks;
pub mod vocabulary;
pub mod workflow;

pub use config::{Config, ConfigError};
pub use service::{AppState, build_router, create_app};
pub use workflow::{build_discharge_workflow, create_discharge_session, create_flow_runner};
pub use models::*;
