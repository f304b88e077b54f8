pub mod errors;
pub mod models;
pub mod pool;
pub mod schema;

use deadpool_diesel::postgres::{Manager, Pool, Runtime};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

pub use errors::{DatabaseError, InitError};
pub use pool::ForesightPool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Build the deadpool-diesel pool the whole process shares.
pub fn init_pool(app_name: &str, database_url: &str) -> Result<Pool, InitError> {
    let manager = Manager::new(database_url, Runtime::Tokio1);
    let pool = Pool::builder(manager)
        .build()
        .map_err(|e| InitError::Pool(e.to_string()))?;

    tracing::info!("[{app_name}] 🔗 Database pool initialized");
    Ok(pool)
}

/// Run the embedded migrations. Called once at startup, before any task.
pub async fn run_migrations(pool: &Pool) -> Result<(), InitError> {
    let conn = pool
        .get()
        .await
        .map_err(|e| InitError::Pool(e.to_string()))?;

    conn.interact(|conn| {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|applied| applied.len())
            .map_err(|e| InitError::Migration(e.to_string()))
    })
    .await
    .map_err(|e| InitError::GenericInit(e.to_string()))?
    .map(|applied| {
        if applied > 0 {
            tracing::info!("🗃️ Applied {applied} pending database migrations");
        }
    })
}
