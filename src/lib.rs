pub mod api;
pub mod config;
pub mod crypto;
pub mod db;

pub use db::DbPool;

use config::Config;
use crypto::PasswordHash;
use tokio::sync::OnceCell;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Digest checked when a login names an unknown user, hashed on first use
    /// with the configured cost.
    pub(crate) login_decoy: OnceCell<PasswordHash>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        Self {
            config,
            db,
            login_decoy: OnceCell::new(),
        }
    }
}
