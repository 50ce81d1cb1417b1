use serde::{Deserialize, Serialize};

/// A row of the out-of-band staff directory import. Used to route
/// review-needed notifications to a department head's address of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub department: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_user_deserialize() {
        let user: DirectoryUser = serde_json::from_str(
            r#"{"username": "ghopper", "firstName": "Grace", "lastName": "Hopper",
                "email": "grace@example.edu"}"#,
        )
        .unwrap();
        assert_eq!(user.username, "ghopper");
        assert_eq!(user.department, None);
        assert_eq!(user.phone, None);
    }
}
