use log::{debug, info};
use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    constants::{INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH},
    error::{store_fault, CatalogError, FieldError},
    jwt::SessionData,
    permissions::ActionType,
    schema::{Ingredient, Uuid},
};

const LOAD_CHUNK_SIZE: usize = 1000;

/// One record of an ingredient data file.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientSeed {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: u64,
    pub skipped: u64,
}

fn clean_field(
    field: &str,
    value: &str,
    max_length: usize,
) -> Result<String, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, "This field must not be empty"));
    }
    if value.chars().count() > max_length {
        return Err(FieldError::new(
            field,
            format!("Must be at most {max_length} characters"),
        ));
    }
    Ok(value.to_owned())
}

fn clean_ingredient(name: &str, measurement_unit: &str) -> Result<(String, String), CatalogError> {
    match (
        clean_field("name", name, INGREDIENT_NAME_MAX_LENGTH),
        clean_field("measurement_unit", measurement_unit, MEASUREMENT_UNIT_MAX_LENGTH),
    ) {
        (Ok(name), Ok(unit)) => Ok((name, unit)),
        (name, unit) => Err(CatalogError::Validation(
            [name.err(), unit.err()].into_iter().flatten().collect(),
        )),
    }
}

pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, potion::Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    let (name, measurement_unit) = clean_ingredient(name, measurement_unit)?;

    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(&name)
    .bind(&measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| match CatalogError::from(e) {
        CatalogError::Integrity(_) => potion::Error::from(CatalogError::Conflict(format!(
            "Ingredient {name} ({measurement_unit}) already exists"
        ))),
        other => potion::Error::from(other),
    })?;

    info!("Created ingredient {}", ingredient.id);
    Ok(ingredient)
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, potion::Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(store_fault)?;

    Ok(row)
}

/// Lists ingredients ordered by name. The prefix match is case-sensitive.
pub async fn list_ingredients(
    name_prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let prefix = name_prefix.filter(|prefix| !prefix.is_empty());

    let rows: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT * FROM ingredients
        WHERE $1::TEXT IS NULL OR starts_with(name, $1)
        ORDER BY name, measurement_unit
    ",
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
    .map_err(store_fault)?;

    Ok(rows)
}

/// Deletes an ingredient unless a recipe still uses it.
pub async fn delete_ingredient(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageIngredients)?;

    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match CatalogError::from(e) {
            CatalogError::Integrity(_) => {
                debug!("Refused to delete ingredient {id}: still referenced");
                potion::Error::from(CatalogError::Conflict(String::from(
                    "Ingredient is used by at least one recipe",
                )))
            }
            other => potion::Error::from(other),
        })?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound(format!("Ingredient {id} does not exist")).into());
    }

    info!("Deleted ingredient {id}");
    Ok(())
}

/// Bulk-loads ingredient records. Incomplete records are skipped, as are
/// pairs that already exist.
pub async fn load_ingredients(
    seeds: Vec<IngredientSeed>,
    pool: &Pool<Postgres>,
) -> Result<LoadSummary, potion::Error> {
    let total = seeds.len() as u64;
    let rows: Vec<(String, String)> = seeds
        .into_iter()
        .filter_map(|seed| {
            let name = seed.name?;
            let unit = seed.measurement_unit?;
            clean_ingredient(&name, &unit).ok()
        })
        .collect();

    let mut inserted = 0;
    let mut tr = pool.begin().await.map_err(store_fault)?;
    for chunk in rows.chunks(LOAD_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        builder.push_values(chunk, |mut b, (name, unit)| {
            b.push_bind(name).push_bind(unit);
        });
        builder.push(" ON CONFLICT DO NOTHING");

        inserted += builder
            .build()
            .execute(&mut *tr)
            .await
            .map_err(store_fault)?
            .rows_affected();
    }
    tr.commit().await.map_err(store_fault)?;

    let summary = LoadSummary {
        inserted,
        skipped: total - inserted,
    };
    info!(
        "Loaded ingredients: {} inserted, {} skipped",
        summary.inserted, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_both_fields() {
        assert_eq!(
            clean_ingredient("  flour ", " g").unwrap(),
            (String::from("flour"), String::from("g"))
        );
    }

    #[test]
    fn reports_every_blank_field() {
        match clean_ingredient(" ", "").unwrap_err() {
            CatalogError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "measurement_unit"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn seeds_deserialize_with_missing_fields() {
        let seeds: Vec<IngredientSeed> = serde_json::from_str(
            r#"[{"name": "salt", "measurement_unit": "g"}, {"name": "pepper"}]"#,
        )
        .unwrap();
        assert_eq!(seeds[1].measurement_unit, None);
    }
}
