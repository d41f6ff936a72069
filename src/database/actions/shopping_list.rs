use log::debug;
use sqlx::{Pool, Postgres};

use super::users::get_user_by_id;
use crate::{
    error::{store_fault, CatalogError},
    report::ShoppingList,
    schema::{RecipeLineItem, Uuid},
};

/// Aggregates the line items of every recipe in the user's cart.
pub async fn fetch_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShoppingList, potion::Error> {
    let user = get_user_by_id(user_id, pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("User {user_id} does not exist")))?;

    let line_items: Vec<RecipeLineItem> = sqlx::query_as(
        "
        SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM shopping_cart c
        JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    debug!(
        "Building shopping list for user {user_id} from {} line items",
        line_items.len()
    );
    Ok(ShoppingList::from_line_items(user.display_name(), line_items)?)
}
