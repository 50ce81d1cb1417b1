use std::path::Path;

use tracing::info;

use crate::cli::commands::SeedArgs;
use crate::config;
use crate::db::Database;
use crate::errors::DeskError;
use crate::models::DirectoryUser;

/// Imports a directory export into the local store. Rows are upserted by
/// username, so re-running with a fresh export refreshes stale entries.
pub async fn handle_seed(args: SeedArgs) -> Result<(), DeskError> {
    let config = config::load_config(args.config.as_deref().map(Path::new)).await?;
    let db = Database::new(&config.database.path)?;

    let content = tokio::fs::read_to_string(&args.file).await?;
    let users: Vec<DirectoryUser> = serde_json::from_str(&content)?;

    for user in &users {
        db.upsert_directory_user(user)?;
    }

    let total = db.count_directory_users()?;
    info!(imported = users.len(), total, "directory import complete");
    println!(
        "Imported {} directory users from {} ({} total)",
        users.len(),
        args.file,
        total
    );
    Ok(())
}
