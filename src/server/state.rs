use crate::controller::Controller;
use std::sync::Arc;

pub struct AppState {
    pub controller: Arc<Controller>,
}
