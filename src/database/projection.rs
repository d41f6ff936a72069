use serde::Serialize;

use super::schema::{Recipe, RecipeLineItem, Tag, User, Uuid};

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProjection {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserProjection {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
            avatar: user.avatar.to_owned(),
        }
    }
}

/// Placeholder rendered for callers without a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymousUser {
    pub id: Option<Uuid>,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl Default for AnonymousUser {
    fn default() -> Self {
        Self {
            id: None,
            email: String::new(),
            username: String::from("Anonymous"),
            first_name: String::new(),
            last_name: String::new(),
            is_subscribed: false,
            avatar: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CurrentUser {
    Authenticated(UserProjection),
    Anonymous(AnonymousUser),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItemProjection {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeLineItem> for LineItemProjection {
    fn from(value: RecipeLineItem) -> Self {
        Self {
            id: value.ingredient_id,
            name: value.name,
            measurement_unit: value.measurement_unit,
            amount: value.amount,
        }
    }
}

/// A recipe aggregate as seen by one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeProjection {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProjection,
    pub ingredients: Vec<LineItemProjection>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinifiedRecipe {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<&Recipe> for MinifiedRecipe {
    fn from(value: &Recipe) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            image: value.image.to_owned(),
            cooking_time: value.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorWithRecipes {
    #[serde(flatten)]
    pub author: UserProjection,
    pub recipes: Vec<MinifiedRecipe>,
    pub recipes_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortLink {
    #[serde(rename = "short-link")]
    pub short_link: String,
}
