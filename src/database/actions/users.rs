use log::{debug, info};
use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        identity::Identity,
        jwt::generate_jwt_session,
    },
    config::CatalogConfig,
    constants::{EMAIL_MAX_LENGTH, USER_NAME_MAX_LENGTH},
    error::{store_fault, CatalogError, FieldError},
    projection::{AnonymousUser, CurrentUser, UserProjection},
    schema::{User, Uuid},
};

const PROJECTION_QUERY: &str = "
    SELECT u.email, u.id, u.username, u.first_name, u.last_name, u.avatar,
        EXISTS(SELECT 1 FROM follows f WHERE f.user_id = $2 AND f.author_id = u.id) AS is_subscribed
    FROM users u WHERE u.id = ANY($1)
";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn username_char(c: char) -> bool {
    c.is_alphanumeric() || "_.@+-".contains(c)
}

impl NewUser {
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut errors = vec![];

        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            errors.push(FieldError::new("email", "Enter a valid email address"));
        } else if email.chars().count() > EMAIL_MAX_LENGTH {
            errors.push(FieldError::new(
                "email",
                format!("Email must be at most {EMAIL_MAX_LENGTH} characters"),
            ));
        }

        if self.username.is_empty() || !self.username.chars().all(username_char) {
            errors.push(FieldError::new(
                "username",
                "Username may contain only letters, digits and _ . @ + -",
            ));
        }

        for (field, value) in [
            ("username", &self.username),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.chars().count() > USER_NAME_MAX_LENGTH {
                errors.push(FieldError::new(
                    field,
                    format!("Must be at most {USER_NAME_MAX_LENGTH} characters"),
                ));
            }
        }

        if self.password.is_empty() {
            errors.push(FieldError::new("password", "Password must not be empty"));
        }

        match errors.is_empty() {
            true => Ok(()),
            false => Err(CatalogError::Validation(errors)),
        }
    }
}

pub async fn get_user_by_id(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(store_fault)?;

    Ok(row)
}

pub async fn get_user_by_email(
    email: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email.trim())
        .fetch_optional(pool)
        .await
        .map_err(store_fault)?;

    Ok(row)
}

/// Creates a user and returns its id. The password is stored as an argon2 hash.
pub async fn register_user(user: NewUser, pool: &Pool<Postgres>) -> Result<Uuid, potion::Error> {
    user.validate()?;

    let password = hash_password(&user.password)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to hash password"))?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(user.email.trim())
    .bind(&user.username)
    .bind(user.first_name.trim())
    .bind(user.last_name.trim())
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| match CatalogError::from(e) {
        CatalogError::Integrity(_) => potion::Error::from(CatalogError::Conflict(String::from(
            "A user with that email or username already exists",
        ))),
        other => potion::Error::from(other),
    })?;

    info!("Registered user {} ({})", id.0, user.username);
    Ok(id.0)
}

/// Returns a signed session token for valid credentials.
pub async fn login_user(
    email: &str,
    password: &str,
    config: &CatalogConfig,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let user = match get_user_by_email(email, pool).await? {
        Some(user) => user,
        None => return Err(HtmlError::InvalidRequest.new("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| HtmlError::InternalServerError.new("Stored password hash is malformed"))?;
    if !authenticated {
        debug!("Rejected login for user {}", user.id);
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    generate_jwt_session(&user, config.jwt_secret.as_bytes(), config.session_hours)
}

/// Author projections for `ids`, with `is_subscribed` relative to `viewer`.
/// Unknown ids are left out.
pub(super) async fn fetch_user_projections(
    ids: &[Uuid],
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserProjection>, potion::Error> {
    let rows: Vec<UserProjection> = sqlx::query_as(PROJECTION_QUERY)
        .bind(ids)
        .bind(viewer)
        .fetch_all(pool)
        .await
        .map_err(store_fault)?;

    Ok(rows)
}

pub async fn user_projection(
    user_id: Uuid,
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<UserProjection, potion::Error> {
    fetch_user_projections(&[user_id], identity.user_id(), pool)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::NotFound(format!("User {user_id} does not exist")).into())
}

pub async fn current_user(
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<CurrentUser, potion::Error> {
    match identity.user_id() {
        Some(user_id) => Ok(CurrentUser::Authenticated(
            user_projection(user_id, identity, pool).await?,
        )),
        None => Ok(CurrentUser::Anonymous(AnonymousUser::default())),
    }
}

/// Sets or clears the avatar reference. Clearing an absent avatar is a
/// precondition failure.
pub async fn set_avatar(
    user_id: Uuid,
    avatar: Option<String>,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, potion::Error> {
    let user = get_user_by_id(user_id, pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("User {user_id} does not exist")))?;

    match &avatar {
        Some(reference) if reference.trim().is_empty() => {
            return Err(CatalogError::invalid("avatar", "Avatar must not be empty").into())
        }
        None if user.avatar.is_none() => {
            return Err(CatalogError::PreconditionFailed(String::from("Avatar is not set")).into())
        }
        _ => {}
    }

    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(&avatar)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(store_fault)?;

    info!("Updated avatar of user {user_id}");
    Ok(avatar)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            email: String::from("cook@example.com"),
            username: username.to_string(),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            password: String::from("secret"),
        }
    }

    #[test]
    fn accepts_usernames_with_allowed_symbols() {
        assert!(new_user("ada.lovelace+cook@home-1_").validate().is_ok());
    }

    #[test]
    fn rejects_bad_usernames_and_passwords() {
        assert!(new_user("ada lovelace").validate().is_err());
        assert!(new_user("").validate().is_err());
        assert!(new_user(&"a".repeat(USER_NAME_MAX_LENGTH + 1)).validate().is_err());

        let user = NewUser {
            password: String::new(),
            email: String::from("not-an-email"),
            ..new_user("cook")
        };
        match user.validate().unwrap_err() {
            CatalogError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "password"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
