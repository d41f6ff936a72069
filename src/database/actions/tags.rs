use log::info;
use sqlx::{Pool, Postgres};

use crate::{
    constants::TAG_FIELD_MAX_LENGTH,
    error::{store_fault, CatalogError, FieldError},
    jwt::SessionData,
    permissions::ActionType,
    schema::{Tag, Uuid},
};

fn valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_tag(name: &str, color: &str, slug: &str) -> Result<(), CatalogError> {
    let mut errors = vec![];

    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name must not be empty"));
    }
    if !valid_color(color) {
        errors.push(FieldError::new("color", "Color must be a hex code like #49B64E"));
    }
    if !valid_slug(slug) {
        errors.push(FieldError::new(
            "slug",
            "Slug may contain only letters, digits, - and _",
        ));
    }
    for (field, value) in [("name", name), ("slug", slug)] {
        if value.chars().count() > TAG_FIELD_MAX_LENGTH {
            errors.push(FieldError::new(
                field,
                format!("Must be at most {TAG_FIELD_MAX_LENGTH} characters"),
            ));
        }
    }

    match errors.is_empty() {
        true => Ok(()),
        false => Err(CatalogError::Validation(errors)),
    }
}

pub async fn create_tag(
    name: &str,
    color: &str,
    slug: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Tag, potion::Error> {
    session.authenticate(ActionType::ManageTags)?;
    validate_tag(name, color, slug)?;

    let tag: Tag =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(name.trim())
            .bind(color)
            .bind(slug)
            .fetch_one(pool)
            .await
            .map_err(|e| match CatalogError::from(e) {
                CatalogError::Integrity(_) => potion::Error::from(CatalogError::Conflict(
                    String::from("A tag with that name, color or slug already exists"),
                )),
                other => potion::Error::from(other),
            })?;

    info!("Created tag {} ({})", tag.id, tag.slug);
    Ok(tag)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(store_fault)?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(store_fault)?;

    Ok(list)
}

pub async fn list_recipe_tags(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.* FROM recipe_tags rt
        JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_hex_codes() {
        assert!(valid_color("#49B64E"));
        assert!(valid_color("#abcdef"));
        assert!(!valid_color("49B64E"));
        assert!(!valid_color("#49B64"));
        assert!(!valid_color("#49B64G"));
    }

    #[test]
    fn slugs_are_url_safe() {
        assert!(valid_slug("quick-dinner_2"));
        assert!(!valid_slug("quick dinner"));
        assert!(!valid_slug(""));
    }

    #[test]
    fn collects_all_tag_errors() {
        match validate_tag(" ", "red", "a b").unwrap_err() {
            CatalogError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
