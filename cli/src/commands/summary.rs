use anyhow::Result;
use std::fmt::Write;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caltrack_core::models::{DailySummary, WeeklySummary};
use caltrack_core::service::CaltrackService;

use super::helpers::{format_macros, parse_date, print_json};
use super::resolve_user;

pub(crate) fn cmd_summary(
    svc: &CaltrackService,
    user: &str,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, user)?;
    let date = parse_date(date)?;
    let summary = svc.daily_summary(user.id, date)?;

    if json {
        return print_json(&summary);
    }

    print!("{}", render_summary(&user.name, &summary)?);
    Ok(())
}

/// Text view of a day. An empty day still shows zero totals against the goals.
fn render_summary(name: &str, summary: &DailySummary) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "=== {name} / {} ===\n", summary.date)?;

    if summary.meals.is_empty() {
        writeln!(out, "  No entries yet\n")?;
    }

    for group in &summary.meals {
        let label = group.meal_slot.as_str().to_uppercase();
        writeln!(out, "  {label} ({:.0} kcal)", group.subtotal.kcal)?;
        for view in &group.entries {
            let e = &view.entry;
            let brand = e
                .food_brand
                .as_ref()
                .map(|b| format!(" ({b})"))
                .unwrap_or_default();
            writeln!(
                out,
                "    [{}] {}{brand}, {:.0}g: {}",
                e.id,
                e.food_name,
                e.quantity_g,
                format_macros(&view.nutrients)
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "  TOTAL:     {}", format_macros(&summary.totals))?;
    writeln!(out, "  GOAL:      {}", format_macros(&summary.goals.as_macros()))?;
    writeln!(out, "  REMAINING: {}", format_macros(&summary.remaining))?;
    Ok(out)
}

pub(crate) fn cmd_week(
    svc: &CaltrackService,
    user: &str,
    end: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, user)?;
    let end = parse_date(end)?;
    let week = svc.weekly_summary(user.id, end)?;

    if json {
        return print_json(&week);
    }

    print!("{}", render_week(&user.name, &week)?);
    Ok(())
}

fn render_week(name: &str, week: &WeeklySummary) -> Result<String> {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<DayRow> = week
        .days
        .iter()
        .map(|d| DayRow {
            date: d.date.to_string(),
            entries: d.entry_count,
            calories: format!("{:.0}", d.totals.kcal),
            protein: format!("{:.1}g", d.totals.protein_g),
            carbs: format!("{:.1}g", d.totals.carbs_g),
            fat: format!("{:.1}g", d.totals.fat_g),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();

    let mut out = String::new();
    writeln!(out, "{name} / {} to {}", week.start, week.end)?;
    writeln!(out, "{table}")?;
    writeln!(out, "  TOTAL:   {}", format_macros(&week.totals))?;
    writeln!(out, "  AVERAGE: {}", format_macros(&week.daily_average))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caltrack_core::models::{FoodSource, MealSlot, NewFood, NewMealEntry};

    fn day(s: &str) -> chrono::NaiveDate {
        caltrack_core::models::parse_date(s).unwrap()
    }

    #[test]
    fn test_render_summary_empty_day_shows_zero_totals() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let user = svc.create_user("Anna", None).unwrap();
        let summary = svc.daily_summary(user.id, day("2024-06-15")).unwrap();

        let text = render_summary(&user.name, &summary).unwrap();
        assert!(text.contains("=== Anna / 2024-06-15 ==="));
        assert!(text.contains("No entries yet"));
        assert!(text.contains("TOTAL:     0 kcal | P:0.0g C:0.0g F:0.0g"));
        assert!(text.contains("GOAL:      2000 kcal"));
        assert!(text.contains("REMAINING: 2000 kcal"));
    }

    #[test]
    fn test_render_summary_lists_entries() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let user = svc.create_user("Anna", None).unwrap();
        let food = svc
            .create_food(&NewFood {
                name: "Oats".to_string(),
                brand: None,
                barcode: None,
                kcal_per_100g: 380.0,
                protein_g: 13.0,
                carbs_g: 60.0,
                fat_g: 7.0,
                fiber_g: Some(10.0),
                sugar_g: None,
                source: FoodSource::Manual,
                external_id: None,
                image_url: None,
            })
            .unwrap();
        svc.log_meal(&NewMealEntry {
            user_id: user.id,
            food_id: food.id,
            date: day("2024-06-15"),
            meal_slot: MealSlot::Breakfast,
            quantity_g: 50.0,
        })
        .unwrap();

        let summary = svc.daily_summary(user.id, day("2024-06-15")).unwrap();
        let text = render_summary(&user.name, &summary).unwrap();
        assert!(text.contains("BREAKFAST (190 kcal)"));
        assert!(text.contains("Oats, 50g"));
        assert!(!text.contains("No entries yet"));
    }

    #[test]
    fn test_render_week_empty_shows_seven_zero_days() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let user = svc.create_user("Ben", None).unwrap();
        let week = svc.weekly_summary(user.id, day("2024-06-16")).unwrap();

        let text = render_week(&user.name, &week).unwrap();
        assert!(text.starts_with("Ben / 2024-06-10 to 2024-06-16"));
        assert!(text.contains("2024-06-13"));
        assert!(text.contains("TOTAL:   0 kcal | P:0.0g C:0.0g F:0.0g"));
        assert!(text.contains("AVERAGE: 0 kcal"));
    }
}
