use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::time::OffsetDateTime;

use super::error::TypeError;

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum RecipeOrder {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl TryFrom<Value> for RecipeOrder {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some(value) => match value {
                "-pub_date" => Ok(Self::Newest),
                "pub_date" => Ok(Self::Oldest),
                "name" => Ok(Self::NameAsc),
                "-name" => Ok(Self::NameDesc),
                _ => Err(TypeError::new("Invalid variant")),
            },
            None => return Err(TypeError::new("Failed to parse value as string")),
        }
    }
}

impl RecipeOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            RecipeOrder::Newest => "r.pub_date DESC, r.id DESC",
            RecipeOrder::Oldest => "r.pub_date, r.id",
            RecipeOrder::NameAsc => "r.name, r.id",
            RecipeOrder::NameDesc => "r.name DESC, r.id DESC",
        }
    }
}

/// Listing filter on a caller-relative membership, given as `"1"` or `"0"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipFlag {
    Member,
    NonMember,
}

impl MembershipFlag {
    /// Values other than `"1"` and `"0"` mean "no filter".
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Self::Member),
            "0" => Some(Self::NonMember),
            _ => None,
        }
    }
}

/// The two user-to-recipe set relations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecipeMembership {
    Favorite,
    ShoppingCart,
}

impl RecipeMembership {
    pub fn table(&self) -> &'static str {
        match self {
            RecipeMembership::Favorite => "favorites",
            RecipeMembership::ShoppingCart => "shopping_cart",
        }
    }

    pub fn already_member(&self) -> &'static str {
        match self {
            RecipeMembership::Favorite => "Recipe is already in favorites",
            RecipeMembership::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    pub fn not_member(&self) -> &'static str {
        match self {
            RecipeMembership::Favorite => "Recipe is not in favorites",
            RecipeMembership::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: Option<String>,
    pub role: UserRole,
}

impl User {
    /// Full name when both parts are present, otherwise the username.
    pub fn display_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();

        if first.is_empty() || last.is_empty() {
            self.username.to_owned()
        } else {
            format!("{first} {last}")
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: OffsetDateTime,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: OffsetDateTime,

    pub count: i64,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            name: row.name,
            text: row.text,
            image: row.image,
            cooking_time: row.cooking_time,
            pub_date: row.pub_date,
        }
    }
}

/// One line item joined with its ingredient.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct RecipeLineItem {
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedRecipeTag {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<LinkedRecipeTag> for Tag {
    fn from(value: LinkedRecipeTag) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            slug: value.slug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(first: &str, last: &str) -> User {
        User {
            id: 1,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: first.to_string(),
            last_name: last.to_string(),
            password: String::from("hash"),
            avatar: None,
            role: UserRole::User,
        }
    }

    #[test]
    fn display_name_needs_both_parts() {
        assert_eq!(user("Ada", "Lovelace").display_name(), "Ada Lovelace");
        assert_eq!(user("Ada", "").display_name(), "cook");
        assert_eq!(user("", "Lovelace").display_name(), "cook");
        assert_eq!(user("  ", " ").display_name(), "cook");
    }

    #[test]
    fn password_is_never_serialized() {
        let value = serde_json::to_value(user("Ada", "Lovelace")).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], "user");
    }

    #[test]
    fn recipe_order_variants() {
        assert_eq!(
            RecipeOrder::try_from(json!("-pub_date")).unwrap(),
            RecipeOrder::Newest
        );
        assert_eq!(RecipeOrder::try_from(json!("name")).unwrap(), RecipeOrder::NameAsc);
        assert!(RecipeOrder::try_from(json!("cooking_time")).is_err());
        assert!(RecipeOrder::try_from(json!(3)).is_err());
    }

    #[test]
    fn membership_flag_ignores_unknown_values() {
        assert_eq!(MembershipFlag::parse("1"), Some(MembershipFlag::Member));
        assert_eq!(MembershipFlag::parse("0"), Some(MembershipFlag::NonMember));
        assert_eq!(MembershipFlag::parse("true"), None);
        assert_eq!(MembershipFlag::parse(""), None);
    }
}
