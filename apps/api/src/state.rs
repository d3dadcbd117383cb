use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::workflow::{SessionState, Workflow};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Workflow>,
    pub sessions: SessionRegistry,
}

/// Holds the live sessions. Each session's state sits behind its own async
/// Mutex, so all actions for one session run as a single sequential control
/// flow while different sessions proceed independently.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Mutex<SessionState>>>>>,
}

impl SessionRegistry {
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(SessionState::new())));
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<SessionState>>> {
        self.inner.read().await.get(&id).cloned()
    }
}
