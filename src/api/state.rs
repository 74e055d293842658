use std::sync::Arc;

use crate::pipeline::StatsPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<StatsPipeline>,
}
