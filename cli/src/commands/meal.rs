use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caltrack_core::models::{MealEntryView, UpdateMealEntry};
use caltrack_core::service::CaltrackService;

use super::helpers::{format_macros, parse_date, parse_quantity, parse_slot, print_json, truncate};
use super::resolve_user;

pub(crate) struct MealRange<'a> {
    pub date: Option<&'a str>,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

/// List a user's entries. `date` selects a single day; `from`/`to` an
/// inclusive range. With neither, the whole log is listed.
pub(crate) fn cmd_meals(
    svc: &CaltrackService,
    user: &str,
    range: &MealRange<'_>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "kcal")]
        kcal: String,
    }

    let user = resolve_user(svc, user)?;
    let (from, to) = if range.date.is_some() {
        if range.from.is_some() || range.to.is_some() {
            bail!("--date cannot be combined with --from/--to");
        }
        let day = parse_date(range.date)?;
        (Some(day), Some(day))
    } else {
        (
            range.from.map(|d| parse_date(Some(d))).transpose()?,
            range.to.map(|d| parse_date(Some(d))).transpose()?,
        )
    };

    let views: Vec<MealEntryView> = svc
        .list_meals(user.id, from, to)?
        .into_iter()
        .map(MealEntryView::from)
        .collect();

    if json {
        return print_json(&views);
    }

    if views.is_empty() {
        eprintln!("No entries for {}", user.name);
        process::exit(2);
    }

    let rows: Vec<MealRow> = views
        .iter()
        .map(|v| MealRow {
            id: v.entry.id,
            date: v.entry.date.to_string(),
            meal: v.entry.meal_slot.to_string(),
            food: truncate(&v.entry.food_name, 35),
            quantity: format!("{:.0}g", v.entry.quantity_g),
            kcal: format!("{:.0}", v.nutrients.kcal),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_delete(svc: &CaltrackService, entry_id: i64, json: bool) -> Result<()> {
    svc.delete_meal(entry_id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": entry_id }));
    } else {
        println!("Deleted entry {entry_id}");
    }

    Ok(())
}

pub(crate) fn cmd_update(
    svc: &CaltrackService,
    entry_id: i64,
    quantity: Option<&str>,
    meal: Option<&str>,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    if quantity.is_none() && meal.is_none() && date.is_none() {
        bail!("Nothing to update. Provide at least one of --quantity, --meal, or --date");
    }

    let update = UpdateMealEntry {
        quantity_g: quantity.map(parse_quantity).transpose()?,
        meal_slot: meal.map(parse_slot).transpose()?,
        date: date.map(|d| parse_date(Some(d))).transpose()?,
    };

    let view = MealEntryView::from(svc.update_meal(entry_id, &update)?);

    if json {
        print_json(&view)?;
    } else {
        println!(
            "Updated entry {entry_id}: {} {:.0}g ({}) on {}: {}",
            view.entry.food_name,
            view.entry.quantity_g,
            view.entry.meal_slot,
            view.entry.date,
            format_macros(&view.nutrients)
        );
    }

    Ok(())
}
