use potion::HtmlError;

use super::jwt::{JwtSessionData, SessionData};
use crate::schema::Uuid;

/// The caller of an operation, resolved before any projection is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated(SessionData),
    Anonymous,
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Authenticated(session) => Some(session.user_id),
            Identity::Anonymous => None,
        }
    }

    pub fn session(&self) -> Result<&SessionData, potion::Error> {
        match self {
            Identity::Authenticated(session) => Ok(session),
            Identity::Anonymous => Err(HtmlError::Unauthorized.new("Authentication required")),
        }
    }
}

impl From<Option<JwtSessionData>> for Identity {
    fn from(value: Option<JwtSessionData>) -> Self {
        match value {
            Some(data) => Identity::Authenticated(data.into()),
            None => Identity::Anonymous,
        }
    }
}

impl From<SessionData> for Identity {
    fn from(value: SessionData) -> Self {
        Identity::Authenticated(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::UserRole;

    #[test]
    fn anonymous_has_no_user() {
        assert_eq!(Identity::Anonymous.user_id(), None);
        assert!(Identity::Anonymous.session().is_err());
        assert_eq!(Identity::from(None), Identity::Anonymous);
    }

    #[test]
    fn authenticated_exposes_session() {
        let identity = Identity::from(SessionData {
            user_id: 3,
            username: String::from("cook"),
            role: UserRole::User,
            is_admin: false,
        });

        assert_eq!(identity.user_id(), Some(3));
        assert_eq!(identity.session().unwrap().username, "cook");
    }
}
