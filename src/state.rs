use crate::bridge::AnalyticsEngine;
use crate::identity::IdentityProvider;
use crate::models::ProfileData;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub profiles: Arc<Mutex<ProfileData>>,
    pub engine: Arc<dyn AnalyticsEngine>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(
        data_path: PathBuf,
        profiles: ProfileData,
        engine: Arc<dyn AnalyticsEngine>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            data_path,
            profiles: Arc::new(Mutex::new(profiles)),
            engine,
            identity,
        }
    }
}
