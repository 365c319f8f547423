//! Application state shared by all handlers.

use crate::services::upload::AdmissionPipeline;
use ingress_core::Config;
use ingress_storage::LocalStager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<AdmissionPipeline>,
    /// Present only for the local backend, whose retrieval URLs this service
    /// serves itself.
    pub local_stager: Option<Arc<LocalStager>>,
    /// Host name recorded on every upload span.
    pub hostname: String,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
