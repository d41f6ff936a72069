use std::collections::{HashMap, HashSet};

use potion::Error;
use serde_json::Value;

use super::{
    error::{CatalogError, FieldError, TypeError},
    schema::{MembershipFlag, RecipeOrder, Uuid},
};
use crate::constants::{COOKING_TIME_MAX, RECIPE_NAME_MAX_LENGTH};

pub type FormData = HashMap<String, Value>;

pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    /// Whether the key was sent at all, even as `null`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, Error>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| TypeError::new("Invalid type conversion").into()),
            None => Err(TypeError::new("Invalid key").into()),
        }
    }

    /// Accepts both JSON numbers and numeric strings.
    pub fn get_integer(&self, key: &str) -> Result<i64, Error> {
        match self.inner.get(key) {
            Some(value) => {
                integer_of(value).ok_or_else(|| type_error(&format!("{key}: expected an integer")))
            }
            None => Err(type_error("Invalid key")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new(&format!("{key}: expected a string"))),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    fn get_optional_str(&self, key: &str) -> Result<Option<String>, Error> {
        match self.contains(key) {
            true => self.get_str(key).map(Some).map_err(Into::<Error>::into),
            false => Ok(None),
        }
    }
}

fn type_error(info: &str) -> Error {
    TypeError::new(info).into()
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One `{id, amount}` element of the submitted ingredient list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientEntry {
    pub ingredient_id: i64,
    pub amount: i64,
}

impl TryFrom<&Value> for IngredientEntry {
    type Error = TypeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let object = value
            .as_object()
            .ok_or_else(|| TypeError::new("ingredients: expected a list of objects"))?;

        let ingredient_id = object
            .get("id")
            .and_then(integer_of)
            .ok_or_else(|| TypeError::new("ingredients: id must be an integer"))?;
        let amount = object
            .get("amount")
            .and_then(integer_of)
            .ok_or_else(|| TypeError::new("ingredients: amount must be an integer"))?;

        Ok(Self {
            ingredient_id,
            amount,
        })
    }
}

/// How a change-set treats the tag set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagsChange {
    /// The `tags` key was not sent.
    #[default]
    Unchanged,
    /// The `tags` key was sent as `null`.
    Clear,
    /// The `tags` key was sent as a list. An empty list fails validation.
    Replace(Vec<i64>),
}

/// Input contract shared by recipe creation and update. Absent keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeChangeSet {
    pub name: Option<String>,
    pub text: Option<String>,
    /// `Some(None)` when `image` was sent as `null`.
    pub image: Option<Option<String>>,
    pub cooking_time: Option<i64>,
    pub tags: TagsChange,
    pub ingredients: Option<Vec<IngredientEntry>>,
}

impl TryFrom<Form> for RecipeChangeSet {
    type Error = Error;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let image = match form.inner.get("image") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(s)) => Some(Some(s.to_owned())),
            Some(_) => return Err(type_error("image: expected a string")),
        };

        let cooking_time = match form.contains("cooking_time") {
            true => Some(form.get_integer("cooking_time")?),
            false => None,
        };

        let tags = match form.inner.get("tags") {
            None => TagsChange::Unchanged,
            Some(Value::Null) => TagsChange::Clear,
            Some(Value::Array(list)) => TagsChange::Replace(
                list.iter()
                    .map(|v| integer_of(v).ok_or_else(|| type_error("tags: expected a list of ids")))
                    .collect::<Result<Vec<i64>, Error>>()?,
            ),
            Some(_) => return Err(type_error("tags: expected a list of ids")),
        };

        let ingredients = match form.inner.get("ingredients") {
            None => None,
            Some(Value::Null) => Some(vec![]),
            Some(Value::Array(list)) => Some(
                list.iter()
                    .map(|v| IngredientEntry::try_from(v).map_err(Into::<Error>::into))
                    .collect::<Result<Vec<IngredientEntry>, Error>>()?,
            ),
            Some(_) => return Err(type_error("ingredients: expected a list")),
        };

        Ok(Self {
            name: form.get_optional_str("name")?,
            text: form.get_optional_str("text")?,
            image,
            cooking_time,
            tags,
            ingredients,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemDraft {
    pub ingredient_id: Uuid,
    pub amount: i32,
}

/// A change-set that passed every check that needs no store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub ingredients: Vec<LineItemDraft>,
    pub tags: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub ingredients: Option<Vec<LineItemDraft>>,
    pub tags: TagChange,
}

/// Validated counterpart of [`TagsChange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    Keep,
    Clear,
    Set(Vec<Uuid>),
}

impl RecipeChangeSet {
    pub fn validate_for_create(self) -> Result<NewRecipe, CatalogError> {
        let mut errors = vec![];

        let image = match &self.image {
            None => {
                errors.push(FieldError::new("image", "This field is required"));
                None
            }
            Some(image) => collect(&mut errors, validate_image(image.as_deref())),
        };
        let name = match &self.name {
            None => {
                errors.push(FieldError::new("name", "This field is required"));
                None
            }
            Some(name) => collect(&mut errors, validate_name(name)),
        };
        let text = match &self.text {
            None => {
                errors.push(FieldError::new("text", "This field is required"));
                None
            }
            Some(text) => collect(&mut errors, validate_text(text)),
        };
        let cooking_time = match self.cooking_time {
            None => {
                errors.push(FieldError::new("cooking_time", "This field is required"));
                None
            }
            Some(minutes) => collect(&mut errors, validate_cooking_time(minutes)),
        };

        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let ingredients = validate_ingredients(self.ingredients.as_deref())?;
        let tags = match validate_tags(&self.tags)? {
            TagChange::Set(tags) => tags,
            TagChange::Keep | TagChange::Clear => vec![],
        };

        match (name, text, image, cooking_time) {
            (Some(name), Some(text), Some(image), Some(cooking_time)) => Ok(NewRecipe {
                name,
                text,
                image,
                cooking_time,
                ingredients,
                tags,
            }),
            _ => Err(CatalogError::invalid("non_field_errors", "Incomplete recipe")),
        }
    }

    pub fn validate_for_update(self) -> Result<RecipePatch, CatalogError> {
        let mut errors = vec![];

        let image = self
            .image
            .as_ref()
            .and_then(|image| collect(&mut errors, validate_image(image.as_deref())));
        let name = self
            .name
            .as_deref()
            .and_then(|name| collect(&mut errors, validate_name(name)));
        let text = self
            .text
            .as_deref()
            .and_then(|text| collect(&mut errors, validate_text(text)));
        let cooking_time = self
            .cooking_time
            .and_then(|minutes| collect(&mut errors, validate_cooking_time(minutes)));

        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let ingredients = match self.ingredients.as_deref() {
            Some(entries) => Some(validate_ingredients(Some(entries))?),
            None => None,
        };
        let tags = validate_tags(&self.tags)?;

        Ok(RecipePatch {
            name,
            text,
            image,
            cooking_time,
            ingredients,
            tags,
        })
    }
}

fn collect<T>(errors: &mut Vec<FieldError>, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn validate_image(image: Option<&str>) -> Result<String, FieldError> {
    match image {
        Some(image) if !image.trim().is_empty() => Ok(image.to_owned()),
        _ => Err(FieldError::new("image", "Image must not be empty")),
    }
}

fn validate_name(name: &str) -> Result<String, FieldError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FieldError::new("name", "Name must not be empty"));
    }
    if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(FieldError::new(
            "name",
            format!("Name must be at most {RECIPE_NAME_MAX_LENGTH} characters"),
        ));
    }
    Ok(name.to_owned())
}

fn validate_text(text: &str) -> Result<String, FieldError> {
    match text.trim().is_empty() {
        true => Err(FieldError::new("text", "Text must not be empty")),
        false => Ok(text.to_owned()),
    }
}

fn validate_cooking_time(minutes: i64) -> Result<i32, FieldError> {
    if minutes < 1 {
        return Err(FieldError::new(
            "cooking_time",
            "Cooking time must be at least 1 minute",
        ));
    }
    if minutes > COOKING_TIME_MAX {
        return Err(FieldError::new(
            "cooking_time",
            format!("Cooking time must be at most {COOKING_TIME_MAX} minutes"),
        ));
    }
    Ok(minutes as i32)
}

/// Emptiness, id shape and positive amounts. Existence and distinctness are
/// checked by the composer once the ingredients are resolved.
pub fn validate_ingredients(
    entries: Option<&[IngredientEntry]>,
) -> Result<Vec<LineItemDraft>, CatalogError> {
    let entries = match entries {
        Some(entries) if !entries.is_empty() => entries,
        _ => {
            return Err(CatalogError::invalid(
                "ingredients",
                "At least one ingredient is required",
            ))
        }
    };

    let mut errors = vec![];
    let mut drafts = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let ingredient_id = Uuid::try_from(entry.ingredient_id).ok().filter(|id| *id > 0);
        let amount = i32::try_from(entry.amount).ok().filter(|amount| *amount >= 1);

        if ingredient_id.is_none() {
            errors.push(FieldError::new(
                format!("ingredients[{i}].id"),
                format!("Ingredient {} does not exist", entry.ingredient_id),
            ));
        }
        if amount.is_none() {
            errors.push(FieldError::new(
                format!("ingredients[{i}].amount"),
                "Amount must be a positive integer",
            ));
        }

        if let (Some(ingredient_id), Some(amount)) = (ingredient_id, amount) {
            drafts.push(LineItemDraft {
                ingredient_id,
                amount,
            });
        }
    }

    match errors.is_empty() {
        true => Ok(drafts),
        false => Err(CatalogError::Validation(errors)),
    }
}

/// Rejects a list naming the same ingredient twice with a single error.
pub fn ensure_distinct(items: &[LineItemDraft]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    match items.iter().all(|item| seen.insert(item.ingredient_id)) {
        true => Ok(()),
        false => Err(CatalogError::invalid(
            "ingredients",
            "Ingredients must not repeat",
        )),
    }
}

pub fn validate_tags(tags: &TagsChange) -> Result<TagChange, CatalogError> {
    match tags {
        TagsChange::Unchanged => Ok(TagChange::Keep),
        TagsChange::Clear => Ok(TagChange::Clear),
        TagsChange::Replace(ids) if ids.is_empty() => Err(CatalogError::invalid(
            "tags",
            "Tags were specified but none were given",
        )),
        TagsChange::Replace(ids) => {
            let mut seen = HashSet::new();
            let mut errors = vec![];
            let mut tags = vec![];

            for (i, id) in ids.iter().enumerate() {
                match Uuid::try_from(*id).ok().filter(|id| *id > 0) {
                    Some(id) => {
                        if seen.insert(id) {
                            tags.push(id);
                        }
                    }
                    None => errors.push(FieldError::new(
                        format!("tags[{i}]"),
                        format!("Tag {id} does not exist"),
                    )),
                }
            }

            match errors.is_empty() {
                true => Ok(TagChange::Set(tags)),
                false => Err(CatalogError::Validation(errors)),
            }
        }
    }
}

/// Listing parameters for recipes. Membership flags are relative to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub is_favorited: Option<MembershipFlag>,
    pub is_in_shopping_cart: Option<MembershipFlag>,
    pub search: Option<String>,
    pub order: RecipeOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RecipeFilter {
    /// Builds a filter from raw query pairs. `tags` may repeat.
    pub fn from_query<'a, I>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::default();

        for (key, value) in pairs {
            match key {
                "author" => {
                    filter.author = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| type_error("author: expected a user id"))?,
                    )
                }
                "tags" if !value.is_empty() => filter.tags.push(value.to_owned()),
                "is_favorited" => filter.is_favorited = MembershipFlag::parse(value),
                "is_in_shopping_cart" => filter.is_in_shopping_cart = MembershipFlag::parse(value),
                "search" | "name" if !value.trim().is_empty() => {
                    filter.search = Some(value.trim().to_owned())
                }
                "order" => {
                    filter.order = RecipeOrder::try_from(Value::String(value.to_owned()))
                        .map_err(Into::<Error>::into)?
                }
                "limit" => filter.limit = Some(parse_page_value("limit", value)?),
                "offset" => filter.offset = Some(parse_page_value("offset", value)?),
                _ => {}
            }
        }

        Ok(filter)
    }
}

fn parse_page_value(key: &str, value: &str) -> Result<i64, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| type_error(&format!("{key}: expected an integer")))
}
