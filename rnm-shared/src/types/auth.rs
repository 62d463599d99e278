use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Owner,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Owner => "owner",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "owner" => Ok(UserRole::Owner),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Claims issued by the identity provider.
///
/// `role` is informational only: services re-read the role from
/// `user_profiles` before authorizing anything that mutates state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default = "default_role")]
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

fn default_role() -> UserRole {
    UserRole::User
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

/// HS256 secret shared with the identity provider.
#[derive(Clone)]
pub struct JwtSecret(pub std::sync::Arc<str>);

impl JwtSecret {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(std::sync::Arc::from(secret.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Anything extractors can read the JWT secret from, typically the app state.
pub trait JwtSecretSource {
    fn jwt_secret(&self) -> JwtSecret;
}

impl JwtSecretSource for JwtSecret {
    fn jwt_secret(&self) -> JwtSecret {
        self.clone()
    }
}

impl<T: JwtSecretSource> JwtSecretSource for std::sync::Arc<T> {
    fn jwt_secret(&self) -> JwtSecret {
        self.as_ref().jwt_secret()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [UserRole::User, UserRole::Owner, UserRole::Admin] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("OWNER".parse::<UserRole>().unwrap(), UserRole::Owner);
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn missing_role_claim_defaults_to_user() {
        let json = format!(
            r#"{{"sub":"{}","iat":0,"exp":4102444800}}"#,
            Uuid::nil()
        );
        let claims: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(claims.role, UserRole::User);
        assert!(!claims.is_expired());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = JwtSecret::new("top-secret");
        assert_eq!(format!("{secret:?}"), "JwtSecret(..)");
    }
}
