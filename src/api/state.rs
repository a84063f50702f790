use crate::config::ConfigLibrary;
use crate::orchestrator::Orchestrator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub configs: ConfigLibrary,
}
