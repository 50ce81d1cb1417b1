use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use crate::errors::DeskError;

pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self, DeskError> {
        // Ensure parent directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| DeskError::Database(format!("Failed to open database: {}", e)))?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| DeskError::Database(format!("Failed to set pragmas: {}", e)))?;

        // A contended file store should wait, not fail
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| DeskError::Database(format!("Failed to set busy timeout: {}", e)))?;

        let db = Self { conn: Arc::new(Mutex::new(conn)) };
        db.initialize()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, DeskError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DeskError::Database(format!("Failed to open in-memory db: {}", e)))?;
        let db = Self { conn: Arc::new(Mutex::new(conn)) };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<(), DeskError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(super::schema::CREATE_TABLES)
            .map_err(|e| DeskError::Database(format!("Failed to create tables: {}", e)))?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { conn: self.conn.clone() }
    }
}
