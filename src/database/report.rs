use std::{collections::BTreeMap, fmt::Write};

use serde::Serialize;

use super::{error::CatalogError, schema::RecipeLineItem};
use crate::constants::{REPORT_SEPARATOR, SERVICE_NAME};

/*
Shopping list report

Shopping list for: Ada Lovelace
--------------------------------------------------
- flour (g) - 500
- sugar (g) - 50
--------------------------------------------------
Foodgram, https://foodgram.example
*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub owner: String,
    pub items: Vec<ShoppingListItem>,
}

/// Sums amounts per (name, unit) pair. Output is ordered by name, then unit,
/// using plain byte ordering.
pub fn aggregate_line_items<I>(line_items: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = RecipeLineItem>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for item in line_items {
        *totals
            .entry((item.name, item.measurement_unit))
            .or_insert(0) += i64::from(item.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

impl ShoppingList {
    pub fn from_line_items<I>(owner: String, line_items: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = RecipeLineItem>,
    {
        let items = aggregate_line_items(line_items);
        if items.is_empty() {
            return Err(CatalogError::PreconditionFailed(String::from(
                "Shopping cart is empty",
            )));
        }

        Ok(Self { owner, items })
    }

    pub fn render(&self, origin: &str) -> String {
        let mut report = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(report, "Shopping list for: {}", self.owner);
        let _ = writeln!(report, "{REPORT_SEPARATOR}");
        for item in self.items.iter() {
            let _ = writeln!(
                report,
                "- {} ({}) - {}",
                item.name, item.measurement_unit, item.amount
            );
        }
        let _ = writeln!(report, "{REPORT_SEPARATOR}");
        let _ = writeln!(report, "{SERVICE_NAME}, {}", origin.trim_end_matches('/'));

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(recipe_id: i32, ingredient_id: i32, name: &str, unit: &str, amount: i32) -> RecipeLineItem {
        RecipeLineItem {
            recipe_id,
            ingredient_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn sums_across_recipes_and_sorts_by_name() {
        let items = aggregate_line_items(vec![
            line(2, 9, "sugar", "g", 50),
            line(1, 4, "flour", "g", 200),
            line(3, 4, "flour", "g", 300),
        ]);

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                    amount: 500,
                },
                ShoppingListItem {
                    name: String::from("sugar"),
                    measurement_unit: String::from("g"),
                    amount: 50,
                },
            ]
        );
    }

    #[test]
    fn same_name_with_other_unit_stays_separate() {
        let items = aggregate_line_items(vec![
            line(1, 1, "milk", "ml", 250),
            line(2, 2, "milk", "cup", 1),
            line(3, 1, "milk", "ml", 100),
        ]);

        let rendered: Vec<(&str, i64)> = items
            .iter()
            .map(|i| (i.measurement_unit.as_str(), i.amount))
            .collect();
        assert_eq!(rendered, vec![("cup", 1), ("ml", 350)]);
    }

    #[test]
    fn ordering_is_ordinal() {
        let items = aggregate_line_items(vec![
            line(1, 1, "apple", "pcs", 1),
            line(1, 2, "Zucchini", "pcs", 1),
            line(1, 3, "Eggs", "pcs", 2),
        ]);

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Eggs", "Zucchini", "apple"]);
    }

    #[test]
    fn empty_cart_is_a_precondition_failure() {
        let error = ShoppingList::from_line_items(String::from("cook"), vec![]).unwrap_err();
        assert!(matches!(error, CatalogError::PreconditionFailed(_)));
    }

    #[test]
    fn renders_report() {
        let list = ShoppingList::from_line_items(
            String::from("Ada Lovelace"),
            vec![
                line(1, 4, "flour", "g", 200),
                line(2, 4, "flour", "g", 300),
                line(2, 9, "sugar", "g", 50),
            ],
        )
        .unwrap();

        let expected = format!(
            "Shopping list for: Ada Lovelace\n{sep}\n- flour (g) - 500\n- sugar (g) - 50\n{sep}\nFoodgram, https://foodgram.example\n",
            sep = REPORT_SEPARATOR
        );
        assert_eq!(list.render("https://foodgram.example/"), expected);
    }
}
