use crate::errors::DeskError;
use crate::models::DirectoryUser;
use super::Database;

impl Database {
    pub fn upsert_directory_user(&self, user: &DirectoryUser) -> Result<(), DeskError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO directory_users (username, first_name, last_name, department, email, phone) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(username) DO UPDATE SET \
                first_name = excluded.first_name, \
                last_name = excluded.last_name, \
                department = excluded.department, \
                email = excluded.email, \
                phone = excluded.phone",
            rusqlite::params![
                user.username,
                user.first_name,
                user.last_name,
                user.department,
                user.email,
                user.phone,
            ],
        )
        .map_err(|e| DeskError::Database(format!("Failed to upsert directory user: {}", e)))?;
        Ok(())
    }

    pub fn lookup_directory_user(&self, username: &str) -> Result<Option<DirectoryUser>, DeskError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT username, first_name, last_name, department, email, phone \
             FROM directory_users WHERE username = ?1",
            rusqlite::params![username],
            |row| {
                Ok(DirectoryUser {
                    username: row.get("username")?,
                    first_name: row.get("first_name")?,
                    last_name: row.get("last_name")?,
                    department: row.get("department")?,
                    email: row.get("email")?,
                    phone: row.get("phone")?,
                })
            },
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DeskError::Database(format!("Query error: {}", e))),
        }
    }

    pub fn count_directory_users(&self) -> Result<i64, DeskError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM directory_users", [], |row| row.get(0))
            .map_err(|e| DeskError::Database(format!("Query error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(username: &str, email: &str) -> DirectoryUser {
        DirectoryUser {
            username: username.to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            department: Some("IT".to_string()),
            email: email.to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_upsert_and_lookup() {
        let db = Database::in_memory().unwrap();
        db.upsert_directory_user(&sample_user("ghopper", "grace@example.edu"))
            .unwrap();

        let user = db.lookup_directory_user("ghopper").unwrap().unwrap();
        assert_eq!(user.email, "grace@example.edu");
        assert_eq!(db.count_directory_users().unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let db = Database::in_memory().unwrap();
        db.upsert_directory_user(&sample_user("ghopper", "old@example.edu"))
            .unwrap();
        db.upsert_directory_user(&sample_user("ghopper", "new@example.edu"))
            .unwrap();

        let user = db.lookup_directory_user("ghopper").unwrap().unwrap();
        assert_eq!(user.email, "new@example.edu");
        assert_eq!(db.count_directory_users().unwrap(), 1);
    }

    #[test]
    fn test_lookup_missing_user() {
        let db = Database::in_memory().unwrap();
        assert!(db.lookup_directory_user("nobody").unwrap().is_none());
    }
}
