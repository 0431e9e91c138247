use crate::models::{Identity, ProviderUser};

const FALLBACK_NAME: &str = "User";

fn metadata_str<'a>(user: &'a ProviderUser, key: &str) -> Option<&'a str> {
    user.user_metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn email_local_part(user: &ProviderUser) -> Option<&str> {
    let email = user.email.as_deref()?;
    let local = email.split('@').next()?.trim();
    (!local.is_empty()).then_some(local)
}

/// Derive display fields from whatever the auth provider supplied.
///
/// Name: `full_name` > `name` > email local-part > "User".
/// Avatar: `avatar_url` > `picture` > none.
pub fn project(user: &ProviderUser) -> Identity {
    let display_name = metadata_str(user, "full_name")
        .or_else(|| metadata_str(user, "name"))
        .or_else(|| email_local_part(user))
        .unwrap_or(FALLBACK_NAME)
        .to_string();

    let avatar_url = metadata_str(user, "avatar_url")
        .or_else(|| metadata_str(user, "picture"))
        .map(str::to_string);

    Identity {
        id: user.id.clone(),
        display_name,
        avatar_url,
    }
}

impl Identity {
    /// Uppercased first character of the display name, for the avatar placeholder.
    pub fn initial(&self) -> String {
        self.display_name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(email: Option<&str>, metadata: serde_json::Value) -> ProviderUser {
        ProviderUser {
            id: "u-1".to_string(),
            email: email.map(str::to_string),
            user_metadata: metadata,
        }
    }

    #[test]
    fn test_full_name_wins_over_everything() {
        let id = project(&user(
            Some("jo@example.com"),
            json!({"full_name": "Jo Doe", "name": "jo"}),
        ));
        assert_eq!(id.display_name, "Jo Doe");
        assert_eq!(id.id, "u-1");
    }

    #[test]
    fn test_name_then_email_prefix_then_literal() {
        let id = project(&user(Some("jo@example.com"), json!({"name": "jo"})));
        assert_eq!(id.display_name, "jo");

        let id = project(&user(Some("jo.smith@example.com"), json!({"full_name": ""})));
        assert_eq!(id.display_name, "jo.smith");

        let id = project(&user(None, json!({})));
        assert_eq!(id.display_name, "User");

        let id = project(&user(Some("@example.com"), serde_json::Value::Null));
        assert_eq!(id.display_name, "User");
    }

    #[test]
    fn test_avatar_fallback_order() {
        let id = project(&user(
            None,
            json!({"avatar_url": "https://a/1.png", "picture": "https://a/2.png"}),
        ));
        assert_eq!(id.avatar_url.as_deref(), Some("https://a/1.png"));

        let id = project(&user(None, json!({"picture": "https://a/2.png"})));
        assert_eq!(id.avatar_url.as_deref(), Some("https://a/2.png"));

        let id = project(&user(None, json!({"avatar_url": "  "})));
        assert!(id.avatar_url.is_none());
    }

    #[test]
    fn test_non_string_metadata_is_ignored() {
        let id = project(&user(Some("x@y.z"), json!({"full_name": 42, "picture": false})));
        assert_eq!(id.display_name, "x");
        assert!(id.avatar_url.is_none());
    }

    #[test]
    fn test_initial_is_uppercased() {
        let id = project(&user(None, json!({"name": "élodie"})));
        assert_eq!(id.initial(), "É");
    }
}
