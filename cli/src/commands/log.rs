use anyhow::Result;

use caltrack_core::models::{MealEntryView, NewMealEntry};
use caltrack_core::service::{CaltrackService, FoodLookup};

use super::helpers::{format_macros, parse_date, parse_quantity, parse_slot, print_json};
use super::{resolve_food, resolve_user};

pub(crate) struct LogArgs<'a> {
    pub user: &'a str,
    pub food: Option<&'a str>,
    pub food_id: Option<i64>,
    pub quantity: &'a str,
    pub meal: &'a str,
    pub date: Option<&'a str>,
}

pub(crate) async fn cmd_log(
    svc: &CaltrackService,
    lookup: &dyn FoodLookup,
    args: LogArgs<'_>,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, args.user)?;
    let meal_slot = parse_slot(args.meal)?;
    let quantity_g = parse_quantity(args.quantity)?;
    let date = parse_date(args.date)?;

    let food = match (args.food_id, args.food) {
        (Some(id), _) => svc.get_food(id)?,
        (None, Some(query)) => resolve_food(svc, lookup, query).await?,
        (None, None) => anyhow::bail!("Provide a food name or --food-id"),
    };

    let entry = svc.log_meal(&NewMealEntry {
        user_id: user.id,
        food_id: food.id,
        date,
        meal_slot,
        quantity_g,
    })?;
    let view = MealEntryView::from(entry);

    if json {
        print_json(&view)?;
    } else {
        println!(
            "Logged for {}: {} {:.0}g ({}) on {}: {}",
            user.name,
            view.entry.food_name,
            view.entry.quantity_g,
            view.entry.meal_slot,
            view.entry.date,
            format_macros(&view.nutrients)
        );
    }

    Ok(())
}
