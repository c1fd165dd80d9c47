use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
}

impl AppState {
    pub fn new(db: Pool<Postgres>) -> Arc<Self> {
        Arc::new(Self { db })
    }
}
