use crate::storage::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    /// Dashboard polling interval.
    pub refresh_ms: u64,
}

impl AppState {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            refresh_ms: 2000,
        }
    }
}
