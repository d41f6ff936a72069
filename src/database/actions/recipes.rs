use std::collections::{HashMap, HashSet};

use log::info;
use potion::HtmlError;
use sqlx::{Pool, Postgres, QueryBuilder};

use super::users::fetch_user_projections;
use crate::{
    authentication::{identity::Identity, jwt::SessionData, permissions::ActionType},
    constants::{RECIPE_COUNT_PER_PAGE, SHORT_LINK_PREFIX},
    error::{store_fault, CatalogError},
    form::RecipeFilter,
    pagination::{page_window, PageContext},
    projection::{LineItemProjection, RecipeProjection, ShortLink},
    schema::{
        LinkedRecipeTag, MembershipFlag, Recipe, RecipeLineItem, RecipeMembership, RecipeRow, Tag,
        Uuid,
    },
};

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(store_fault)?;

    Ok(row)
}

/// Loads a recipe the session may modify: its own, or any for admins.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(HtmlError::Unauthorized.default())
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(CatalogError::NotFound(format!("Recipe {id} does not exist")).into()),
    }
}

/// Line items of the given recipes, each recipe's items in submission order.
pub async fn list_line_items(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeLineItem>, potion::Error> {
    let rows: Vec<RecipeLineItem> = sqlx::query_as(
        "
        SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.recipe_id, ri.position
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    Ok(rows)
}

async fn list_linked_tags(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<Vec<LinkedRecipeTag>, potion::Error> {
    let rows: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    Ok(rows)
}

async fn member_recipes(
    kind: RecipeMembership,
    user_id: Uuid,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, potion::Error> {
    let query = format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
        kind.table()
    );
    let rows: Vec<(Uuid,)> = sqlx::query_as(&query)
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(pool)
        .await
        .map_err(store_fault)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Builds caller-relative projections, preserving the order of `recipes`.
pub(super) async fn project_recipes(
    recipes: Vec<Recipe>,
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeProjection>, potion::Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<Uuid, _> = fetch_user_projections(&author_ids, identity.user_id(), pool)
        .await?
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    let mut line_items: HashMap<Uuid, Vec<LineItemProjection>> = HashMap::new();
    for item in list_line_items(&recipe_ids, pool).await? {
        line_items
            .entry(item.recipe_id)
            .or_default()
            .push(item.into());
    }

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for tag in list_linked_tags(&recipe_ids, pool).await? {
        tags.entry(tag.recipe_id).or_default().push(tag.into());
    }

    let (favorites, cart) = match identity.user_id() {
        Some(user_id) => (
            member_recipes(RecipeMembership::Favorite, user_id, &recipe_ids, pool).await?,
            member_recipes(RecipeMembership::ShoppingCart, user_id, &recipe_ids, pool).await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| -> Result<RecipeProjection, potion::Error> {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                potion::Error::from(CatalogError::Integrity(format!(
                    "Author of recipe {} no longer exists",
                    recipe.id
                )))
            })?;

            Ok(RecipeProjection {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author,
                ingredients: line_items.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorites.contains(&recipe.id),
                is_in_shopping_cart: cart.contains(&recipe.id),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}

pub async fn get_recipe_projection(
    id: Uuid,
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<RecipeProjection, potion::Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("Recipe {id} does not exist")))?;

    project_recipes(vec![recipe], identity, pool)
        .await?
        .pop()
        .ok_or_else(|| CatalogError::NotFound(format!("Recipe {id} does not exist")).into())
}

fn push_membership_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    kind: RecipeMembership,
    flag: Option<MembershipFlag>,
    viewer: Option<Uuid>,
) {
    match (flag, viewer) {
        (None, _) | (Some(MembershipFlag::NonMember), None) => {}
        (Some(MembershipFlag::Member), None) => {
            builder.push(" AND FALSE");
        }
        (Some(flag), Some(user_id)) => {
            builder.push(match flag {
                MembershipFlag::Member => " AND EXISTS (SELECT 1 FROM ",
                MembershipFlag::NonMember => " AND NOT EXISTS (SELECT 1 FROM ",
            });
            builder.push(kind.table());
            builder.push(" m WHERE m.recipe_id = r.id AND m.user_id = ");
            builder.push_bind(user_id);
            builder.push(")");
        }
    }
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub async fn fetch_recipes(
    filter: RecipeFilter,
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeProjection>, potion::Error> {
    let (limit, offset) = page_window(filter.limit, filter.offset, RECIPE_COUNT_PER_PAGE);
    let viewer = identity.user_id();

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ");
        builder.push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        builder.push_bind(filter.tags);
        builder.push("))");
    }

    push_membership_filter(
        &mut builder,
        RecipeMembership::Favorite,
        filter.is_favorited,
        viewer,
    );
    push_membership_filter(
        &mut builder,
        RecipeMembership::ShoppingCart,
        filter.is_in_shopping_cart,
        viewer,
    );

    if let Some(search) = filter.search {
        let pattern = like_pattern(&search);
        builder.push(" AND (r.name ILIKE ");
        builder.push_bind(pattern.to_owned());
        builder.push(" OR r.text ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(" ORDER BY ");
    builder.push(filter.order.as_sql());
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(store_fault)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes = rows.into_iter().map(Recipe::from).collect();
    let projections = project_recipes(recipes, identity, pool).await?;

    Ok(PageContext::from_rows(projections, total_count, limit, offset))
}

/// Deletes a recipe with its line items, tags and memberships.
pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(store_fault)?;

    info!("Deleted recipe {id}");
    Ok(())
}

pub fn short_link(recipe_id: Uuid, origin: &str) -> String {
    format!(
        "{}{SHORT_LINK_PREFIX}/{recipe_id}/",
        origin.trim_end_matches('/')
    )
}

pub async fn get_short_link(
    recipe_id: Uuid,
    origin: &str,
    pool: &Pool<Postgres>,
) -> Result<ShortLink, potion::Error> {
    match get_recipe(recipe_id, pool).await? {
        Some(recipe) => Ok(ShortLink {
            short_link: short_link(recipe.id, origin),
        }),
        None => Err(CatalogError::NotFound(format!("Recipe {recipe_id} does not exist")).into()),
    }
}
