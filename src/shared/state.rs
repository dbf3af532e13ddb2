use std::sync::Arc;

use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::scan_access::policy::AccessPolicy;
use crate::shared::utils::DbPool;
use crate::webhook::directory::OwnerDirectory;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub notifier: Arc<dyn Notifier>,
    pub access_policy: Arc<dyn AccessPolicy>,
    pub owner_directory: Arc<dyn OwnerDirectory>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            notifier: Arc::clone(&self.notifier),
            access_policy: Arc::clone(&self.access_policy),
            owner_directory: Arc::clone(&self.owner_directory),
        }
    }
}
