use std::collections::HashMap;

use log::{debug, info};
use sqlx::{Pool, Postgres};

use super::{recipes::get_recipe, users::get_user_by_id};
use crate::{
    constants::USER_COUNT_PER_PAGE,
    error::{store_fault, CatalogError},
    pagination::{page_window, PageContext},
    projection::{AuthorWithRecipes, MinifiedRecipe, UserProjection},
    schema::{RecipeMembership, Uuid},
};

#[derive(sqlx::FromRow, Debug)]
struct AuthoredRecipeRow {
    author_id: Uuid,
    #[sqlx(flatten)]
    recipe: MinifiedRecipe,
    total: i64,
}

#[derive(sqlx::FromRow, Debug)]
struct SubscriptionRow {
    #[sqlx(flatten)]
    author: UserProjection,
    count: i64,
}

/// Adds a recipe to the user's favorites or cart. The store's primary key
/// decides between concurrent duplicate adds.
pub async fn add_membership(
    kind: RecipeMembership,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<MinifiedRecipe, potion::Error> {
    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("Recipe {recipe_id} does not exist")))?;

    let query = format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.table()
    );
    let result = sqlx::query(&query)
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(store_fault)?;

    if result.rows_affected() == 0 {
        debug!("User {user_id}: {}", kind.already_member());
        return Err(CatalogError::Conflict(kind.already_member().to_string()).into());
    }

    info!("User {user_id} added recipe {recipe_id} to {}", kind.table());
    Ok(MinifiedRecipe::from(&recipe))
}

pub async fn remove_membership(
    kind: RecipeMembership,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(CatalogError::NotFound(format!("Recipe {recipe_id} does not exist")).into());
    }

    let query = format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    );
    let result = sqlx::query(&query)
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(store_fault)?;

    if result.rows_affected() == 0 {
        debug!("User {user_id}: {}", kind.not_member());
        return Err(CatalogError::PreconditionFailed(kind.not_member().to_string()).into());
    }

    info!("User {user_id} removed recipe {recipe_id} from {}", kind.table());
    Ok(())
}

pub async fn count_members(
    kind: RecipeMembership,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let query = format!("SELECT COUNT(*) FROM {} WHERE recipe_id = $1", kind.table());
    let count: (i64,) = sqlx::query_as(&query)
        .bind(recipe_id)
        .fetch_one(pool)
        .await
        .map_err(store_fault)?;

    Ok(count.0)
}

/// Attaches each author's newest recipes, capped by `recipes_limit` when it
/// is positive. `recipes_count` is always the author's full total.
async fn with_recipes(
    authors: Vec<UserProjection>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthorWithRecipes>, potion::Error> {
    let author_ids: Vec<Uuid> = authors.iter().map(|author| author.id).collect();

    let rows: Vec<AuthoredRecipeRow> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time, total FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS rank,
                COUNT(*) OVER (PARTITION BY r.author_id) AS total
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR rank <= $2
        ORDER BY author_id, rank
    ",
    )
    .bind(author_ids)
    .bind(recipes_limit.filter(|limit| *limit > 0))
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    let mut by_author: HashMap<Uuid, (Vec<MinifiedRecipe>, i64)> = HashMap::new();
    for row in rows {
        let entry = by_author.entry(row.author_id).or_insert((vec![], row.total));
        entry.0.push(row.recipe);
    }

    Ok(authors
        .into_iter()
        .map(|author| {
            let (recipes, recipes_count) = by_author.remove(&author.id).unwrap_or((vec![], 0));
            AuthorWithRecipes {
                author,
                recipes,
                recipes_count,
            }
        })
        .collect())
}

/// Follows an author. Following yourself is refused before anything else.
pub async fn follow_author(
    user_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<AuthorWithRecipes, potion::Error> {
    if user_id == author_id {
        debug!("User {user_id} tried to follow themself");
        return Err(CatalogError::Conflict(String::from("You cannot follow yourself")).into());
    }

    let author = get_user_by_id(author_id, pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("User {author_id} does not exist")))?;

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(store_fault)?;

    if result.rows_affected() == 0 {
        debug!("User {user_id} already follows {author_id}");
        return Err(
            CatalogError::Conflict(String::from("You already follow this author")).into(),
        );
    }

    info!("User {user_id} followed {author_id}");
    with_recipes(
        vec![UserProjection::from_user(&author, true)],
        recipes_limit,
        pool,
    )
    .await?
    .pop()
    .ok_or_else(|| CatalogError::NotFound(format!("User {author_id} does not exist")).into())
}

pub async fn unfollow_author(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    if get_user_by_id(author_id, pool).await?.is_none() {
        return Err(CatalogError::NotFound(format!("User {author_id} does not exist")).into());
    }

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(store_fault)?;

    if result.rows_affected() == 0 {
        debug!("User {user_id} does not follow {author_id}");
        return Err(
            CatalogError::PreconditionFailed(String::from("You do not follow this author"))
                .into(),
        );
    }

    info!("User {user_id} unfollowed {author_id}");
    Ok(())
}

/// Authors the user follows, most recent follow first.
pub async fn fetch_subscriptions(
    user_id: Uuid,
    recipes_limit: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<AuthorWithRecipes>, potion::Error> {
    let (limit, offset) = page_window(limit, offset, USER_COUNT_PER_PAGE);

    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name, u.avatar,
            TRUE AS is_subscribed, COUNT(*) OVER() AS count
        FROM follows f
        JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC, f.id DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let authors = rows.into_iter().map(|row| row.author).collect();
    let authors = with_recipes(authors, recipes_limit, pool).await?;

    Ok(PageContext::from_rows(authors, total_count, limit, offset))
}
