//! Shared state handed to every axum handler via `State<AppState>`.

use std::sync::Arc;

use crate::domain::ports::{ControlSignalStore, ScheduleStore};
use crate::services::SchedulerService;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScheduleStore>,
    pub scheduler: Arc<SchedulerService>,
    pub signals: Arc<dyn ControlSignalStore>,
    pub tenant_id: String,
}
