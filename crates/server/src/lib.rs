use std::sync::Arc;

use db::DBService;
use services::services::{browser_pod::BrowserPod, executions::ExecutionService};

pub mod error;
pub mod middleware;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    executions: ExecutionService,
}

impl AppState {
    pub fn new(db: DBService, pod: Arc<dyn BrowserPod>) -> Self {
        let executions = ExecutionService::new(db.clone(), pod);
        AppState { db, executions }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn executions(&self) -> &ExecutionService {
        &self.executions
    }
}
