use serde_json::{json, Value};
use warp::{
    http::StatusCode,
    reply::{self, Reply},
};

use crate::{constants::SHOPPING_LIST_FILENAME, report::ShoppingList};

/// The rendered shopping list as a plain-text download.
pub fn shopping_list_reply(list: &ShoppingList, origin: &str) -> impl Reply {
    let report = reply::with_header(
        list.render(origin),
        "content-type",
        "text/plain; charset=utf-8",
    );

    reply::with_header(
        report,
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
}

/// JSON body for a failed operation. Field-keyed validation info is nested
/// under `errors`, anything else becomes `detail`.
pub fn error_body(error: &potion::Error) -> Value {
    let info = error.info.as_deref().unwrap_or_default();

    match serde_json::from_str::<Value>(info) {
        Ok(fields @ Value::Object(_)) => json!({ "errors": fields }),
        _ => json!({ "detail": info }),
    }
}

pub fn error_reply(error: &potion::Error) -> impl Reply {
    let status =
        StatusCode::from_u16(error.code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    reply::with_status(reply::json(&error_body(error)), status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{CatalogError, FieldError},
        schema::RecipeLineItem,
    };

    fn list() -> ShoppingList {
        ShoppingList::from_line_items(
            String::from("cook"),
            vec![RecipeLineItem {
                recipe_id: 1,
                ingredient_id: 1,
                name: String::from("flour"),
                measurement_unit: String::from("g"),
                amount: 500,
            }],
        )
        .unwrap()
    }

    #[test]
    fn shopping_list_is_an_attachment() {
        let response = shopping_list_reply(&list(), "https://foodgram.example").into_response();
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers["content-type"], "text/plain; charset=utf-8");
        assert_eq!(
            headers["content-disposition"],
            "attachment; filename=\"shopping_list.txt\""
        );
    }

    #[test]
    fn validation_errors_are_nested_by_field() {
        let error: potion::Error = CatalogError::Validation(vec![FieldError::new(
            "ingredients",
            "At least one ingredient is required",
        )])
        .into();

        assert_eq!(
            error_body(&error),
            json!({ "errors": { "ingredients": ["At least one ingredient is required"] } })
        );
        assert_eq!(
            error_reply(&error).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn other_failures_use_detail() {
        let error: potion::Error =
            CatalogError::PreconditionFailed(String::from("Shopping cart is empty")).into();

        assert_eq!(error_body(&error), json!({ "detail": "Shopping cart is empty" }));
        assert_eq!(
            error_reply(&error).into_response().status(),
            StatusCode::PRECONDITION_FAILED
        );
    }
}
