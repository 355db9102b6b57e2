use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caltrack_core::models::{Food, Macros, MealSlot, NewFood, convert_to_grams};

/// Parse a quantity with optional unit into grams.
/// Accepts: "200", "200g", "500ml", "500 ml", "2 tbsp", "1.5 oz", etc.
pub(crate) fn parse_quantity(s: &str) -> Result<f64> {
    let s = s.trim();

    // Plain grams: "500" or "500g"
    if let Ok(g) = parse_grams(s) {
        return Ok(g);
    }

    let (qty, unit) = match split_number_unit(s) {
        Some(pair) => pair,
        None => {
            let parts: Vec<&str> = s.splitn(2, char::is_whitespace).collect();
            if parts.len() != 2 {
                bail!("Invalid quantity format: '{s}'. Use '200g', '500ml', '2 tbsp', etc.");
            }
            let qty: f64 = parts[0]
                .parse()
                .with_context(|| format!("Invalid quantity: '{s}'"))?;
            (qty, parts[1].trim())
        }
    };

    let Some((grams, is_approx)) = convert_to_grams(qty, unit) else {
        bail!("Unknown unit '{unit}' in '{s}'. Supported: g, kg, lb, oz, tbsp, tsp, ml, l");
    };
    if grams <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    if is_approx {
        eprintln!("Note: {qty} {unit} ≈ {grams:.0}g (approximate, assumes water density)");
    }
    Ok(grams)
}

/// Split "500ml" or "2.5tbsp" into (500.0, "ml") or (2.5, "tbsp").
fn split_number_unit(s: &str) -> Option<(f64, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let qty: f64 = num_part.trim().parse().ok()?;
    if unit_part.is_empty() {
        return None;
    }
    Some((qty, unit_part))
}

fn parse_grams(s: &str) -> Result<f64> {
    let trimmed = s.trim_end_matches('g').trim();
    let value: f64 = trimmed.parse().with_context(|| {
        format!("Invalid quantity: '{s}'. Use a number like '200' or '200g'")
    })?;
    if value <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match date_str {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - chrono::Duration::days(1)),
        Some("tomorrow") => Ok(today + chrono::Duration::days(1)),
        Some(s) => caltrack_core::models::parse_date(s).with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

pub(crate) fn parse_slot(s: &str) -> Result<MealSlot> {
    Ok(s.parse::<MealSlot>()?)
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a food (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Tabled)]
struct FoodRow {
    #[tabled(rename = "#")]
    idx: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Brand")]
    brand: String,
    #[tabled(rename = "kcal/100g")]
    kcal: String,
    #[tabled(rename = "P/100g")]
    protein: String,
    #[tabled(rename = "C/100g")]
    carbs: String,
    #[tabled(rename = "F/100g")]
    fat: String,
    #[tabled(rename = "Fib/100g")]
    fiber: String,
    #[tabled(rename = "Sug/100g")]
    sugar: String,
    #[tabled(rename = "Barcode")]
    barcode: String,
}

fn food_row(idx: usize, id: Option<i64>, food: &NewFood) -> FoodRow {
    FoodRow {
        idx,
        id: id.map_or_else(|| "-".to_string(), |id| id.to_string()),
        name: truncate(&food.name, 35),
        brand: food
            .brand
            .as_deref()
            .map(|b| truncate(b, 20))
            .unwrap_or_default(),
        kcal: format!("{:.0}", food.kcal_per_100g),
        protein: format!("{:.1}", food.protein_g),
        carbs: format!("{:.1}", food.carbs_g),
        fat: format!("{:.1}", food.fat_g),
        fiber: optional_grams(food.fiber_g),
        sugar: optional_grams(food.sugar_g),
        barcode: food.barcode.clone().unwrap_or_default(),
    }
}

fn optional_grams(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn print_rows(rows: &[FoodRow]) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..10)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_food_table(foods: &[Food]) {
    let rows: Vec<FoodRow> = foods
        .iter()
        .enumerate()
        .map(|(i, f)| food_row(i + 1, Some(f.id), &NewFood::from(f)))
        .collect();
    print_rows(&rows);
}

/// Table for external candidates, which have no catalog id yet.
pub(crate) fn print_candidate_table(candidates: &[NewFood]) {
    let rows: Vec<FoodRow> = candidates
        .iter()
        .enumerate()
        .map(|(i, f)| food_row(i + 1, None, f))
        .collect();
    print_rows(&rows);
}

pub(crate) fn format_macros(m: &Macros) -> String {
    format!(
        "{:.0} kcal | P:{:.1}g C:{:.1}g F:{:.1}g",
        m.kcal, m.protein_g, m.carbs_g, m.fat_g
    )
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
