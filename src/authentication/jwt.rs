use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole, hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(hours)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(
                HtmlError::Unauthorized.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }
}

impl Into<SessionData> for JwtSessionData {
    fn into(self) -> SessionData {
        SessionData {
            username: self.username,
            user_id: self.user_id,
            is_admin: self.role == UserRole::Admin,
            role: self.role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret)
        .map_err(|_| HtmlError::InternalServerError.new("Invalid session signing key"))
}

pub fn generate_jwt_session(
    user: &User,
    secret: &[u8],
    hours: i64,
) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned(), hours);

    claims
        .sign_with_key(&key)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to sign session"))
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            password: String::new(),
            avatar: None,
            role: UserRole::User,
        }
    }

    #[test]
    fn session_round_trip() {
        let token = generate_jwt_session(&user(), b"kitchen", 1).unwrap();
        let session: SessionData = verify_jwt_session(&token, b"kitchen").unwrap().into();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.username, "cook");
        assert!(!session.is_admin);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = generate_jwt_session(&user(), b"kitchen", 1).unwrap();
        assert!(verify_jwt_session(&token, b"pantry").is_err());
        assert!(verify_jwt_session("not.a.token", b"kitchen").is_err());
    }

    #[test]
    fn expired_session_is_rejected() {
        let token = generate_jwt_session(&user(), b"kitchen", -1).unwrap();
        assert!(verify_jwt_session(&token, b"kitchen").is_err());
    }
}
