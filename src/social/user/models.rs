//! User row models.

use crate::social::storage::models::MediaSource;
use serde::{Deserialize, Serialize};

/// One row of the `users` table, consumed as a plain record. Every column
/// except the id may be absent on freshly-signed-up accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// The backend column is camel-cased.
    #[serde(default, rename = "phoneNumber")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Stored path of the avatar in object storage; the public URL is
    /// derived on read.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The embedded author shape used by feed and comment queries:
/// `users (id, name, image)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserBrief {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<UserRow> for UserBrief {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
        }
    }
}

/// Profile edit form. Every field is required; the avatar may still be a
/// local file at submission time.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub bio: String,
    pub image: Option<MediaSource>,
}

/// Columns written by a profile update.
#[derive(Debug, Serialize)]
pub struct UserPatch {
    pub name: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub address: String,
    pub bio: String,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rows_carry_the_camel_cased_phone_column() {
        let row: UserRow =
            serde_json::from_str(r#"{"id": "u-1", "name": "Ada", "phoneNumber": "12345"}"#)
                .unwrap();
        assert_eq!(row.phone_number.as_deref(), Some("12345"));

        let patch = UserPatch {
            name: "Ada".to_string(),
            phone_number: "12345".to_string(),
            address: "Somewhere".to_string(),
            bio: "Hi".to_string(),
            image: None,
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["phoneNumber"], "12345");
        assert!(json.get("phone_number").is_none());
    }
}
