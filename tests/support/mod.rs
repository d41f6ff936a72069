#![allow(dead_code)]

use foodgram_sdk::{
    actions::{create_ingredient, create_recipe, create_tag, register_user, NewUser},
    connect,
    form::{Form, FormData, RecipeChangeSet},
    jwt::SessionData,
    migrate,
    projection::RecipeProjection,
    schema::{Ingredient, Tag, UserRole},
    CatalogConfig,
};
use serde_json::{json, Value};
use sqlx::{Pool, Postgres};

/// Connects to the database named by `DATABASE_URL` and applies migrations.
/// Returns `None` when the variable is unset so the caller can skip.
pub async fn pool(test_name: &str) -> Option<Pool<Postgres>> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping {test_name}: DATABASE_URL not set");
            return None;
        }
    };

    let config = CatalogConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.to_owned()),
        "JWT_SECRET" => Some(String::from("integration")),
        _ => None,
    })
    .expect("config");

    let pool = connect(&config).await.expect("connect to postgres");
    migrate(&pool).await.expect("apply migrations");
    Some(pool)
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

pub fn admin() -> SessionData {
    SessionData {
        user_id: 0,
        username: String::from("admin"),
        role: UserRole::Admin,
        is_admin: true,
    }
}

pub async fn user(pool: &Pool<Postgres>) -> SessionData {
    let username = unique("cook");
    let user_id = register_user(
        NewUser {
            email: format!("{username}@example.com"),
            username: username.to_owned(),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            password: String::from("correct horse"),
        },
        pool,
    )
    .await
    .expect("register user");

    SessionData {
        user_id,
        username,
        role: UserRole::User,
        is_admin: false,
    }
}

pub async fn ingredient(pool: &Pool<Postgres>, name: &str, unit: &str) -> Ingredient {
    create_ingredient(&unique(name), unit, &admin(), pool)
        .await
        .expect("create ingredient")
}

pub async fn tag(pool: &Pool<Postgres>) -> Tag {
    let slug = unique("tag");
    let hex: String = uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect();
    create_tag(&slug, &format!("#{hex}"), &slug, &admin(), pool)
        .await
        .expect("create tag")
}

pub fn changes(value: Value) -> RecipeChangeSet {
    let data: FormData = serde_json::from_value(value).expect("object payload");
    RecipeChangeSet::try_from(Form::from_data(data)).expect("well-formed payload")
}

pub fn items(entries: &[(&Ingredient, i64)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(ingredient, amount)| json!({ "id": ingredient.id, "amount": amount }))
            .collect(),
    )
}

pub async fn recipe(
    pool: &Pool<Postgres>,
    session: &SessionData,
    entries: &[(&Ingredient, i64)],
) -> RecipeProjection {
    create_recipe(
        changes(json!({
            "name": unique("recipe"),
            "text": "Mix everything.",
            "image": "recipes/images/dish.png",
            "cooking_time": 15,
            "ingredients": items(entries),
        })),
        session,
        pool,
    )
    .await
    .expect("create recipe")
}

pub fn code<T>(result: Result<T, potion::Error>) -> u16 {
    match result {
        Ok(_) => panic!("expected the operation to fail"),
        Err(error) => error.code as u16,
    }
}
