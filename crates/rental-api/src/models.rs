//! Wire models shared by the client and the session core.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// How the account was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

/// Cached identity record.
///
/// `favorites` is a set of listing ids. Order carries no meaning; duplicates
/// are dropped on load and the mutators below keep entries unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "unique_ids")]
    pub favorites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AuthProvider>,
}

impl User {
    pub fn is_favorite(&self, listing_id: &str) -> bool {
        self.favorites.iter().any(|id| id == listing_id)
    }

    /// Set membership of `listing_id`. Returns true if the set changed.
    pub fn set_favorite(&mut self, listing_id: &str, favorited: bool) -> bool {
        let present = self.is_favorite(listing_id);
        match (present, favorited) {
            (false, true) => {
                self.favorites.push(listing_id.to_string());
                true
            }
            (true, false) => {
                self.favorites.retain(|id| id != listing_id);
                true
            }
            _ => false,
        }
    }
}

/// Keeps the first occurrence of each id.
fn unique_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = Vec::<String>::deserialize(deserializer)?;
    let mut seen = HashSet::with_capacity(ids.len());
    Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
}

/// Tokens (and possibly the user) returned by login, register and refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

/// Listing details shown on the favorites screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteListing {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_minimal_payload() {
        let user: User = serde_json::from_str(r#"{"id":"u1","favorites":[]}"#).unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.name.is_empty());
        assert!(user.favorites.is_empty());
        assert_eq!(user.provider, None);
    }

    #[test]
    fn test_duplicate_favorites_collapse_on_load() {
        let mut user: User =
            serde_json::from_str(r#"{"id":"u1","favorites":["L1","L2","L1"]}"#).unwrap();
        assert_eq!(user.favorites, vec!["L1", "L2"]);

        assert!(user.set_favorite("L1", false));
        assert!(!user.is_favorite("L1"));
        assert_eq!(user.favorites, vec!["L2"]);
    }

    #[test]
    fn test_user_provider_is_lowercase() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","name":"Ann","email":"a@b.com","favorites":["L1"],"provider":"google"}"#,
        )
        .unwrap();
        assert_eq!(user.provider, Some(AuthProvider::Google));

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains(r#""provider":"google""#));
        assert!(!json.contains("avatar"));
    }

    #[test]
    fn test_set_favorite_keeps_ids_unique() {
        let mut user: User = serde_json::from_str(r#"{"id":"u1","favorites":["A"]}"#).unwrap();

        assert!(!user.set_favorite("A", true));
        assert_eq!(user.favorites, vec!["A"]);

        assert!(user.set_favorite("B", true));
        assert!(user.is_favorite("B"));

        assert!(user.set_favorite("A", false));
        assert!(!user.set_favorite("A", false));
        assert_eq!(user.favorites, vec!["B"]);
    }

    #[test]
    fn test_favorite_listing_optional_rating() {
        let listing: FavoriteListing = serde_json::from_str(
            r#"{"id":"L1","title":"Loft","location":"Lisbon","price":120,"image":"a.jpg"}"#,
        )
        .unwrap();
        assert_eq!(listing.price, 120.0);
        assert_eq!(listing.rating, None);
    }
}
