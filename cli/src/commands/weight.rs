use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caltrack_core::models::NewWeightEntry;
use caltrack_core::service::CaltrackService;

use super::helpers::{parse_date, print_json};
use super::resolve_user;

const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

fn to_kg(value: f64, unit: &str) -> Result<f64> {
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => Ok(value * KG_PER_LB),
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

pub(crate) struct WeightInput<'a> {
    pub user: &'a str,
    pub value: f64,
    pub unit: &'a str,
    pub date: Option<&'a str>,
    pub note: Option<String>,
}

pub(crate) fn cmd_weight_log(svc: &CaltrackService, input: WeightInput<'_>, json: bool) -> Result<()> {
    let user = resolve_user(svc, input.user)?;
    let weight_kg = to_kg(input.value, input.unit)?;
    if input.unit.to_lowercase() != "kg" {
        eprintln!("Converting {:.1} lbs → {weight_kg:.2} kg", input.value);
    }

    let entry = svc.log_weight(&NewWeightEntry {
        user_id: user.id,
        date: parse_date(input.date)?,
        weight_kg,
        note: input.note,
    })?;

    if json {
        print_json(&entry)?;
    } else {
        println!(
            "Logged {:.1} kg ({:.1} lbs) for {} on {}",
            entry.weight_kg,
            entry.weight_kg * LBS_PER_KG,
            user.name,
            entry.date
        );
        if let Some(ref n) = entry.note {
            println!("  Note: {n}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_weight_history(
    svc: &CaltrackService,
    user: &str,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, user)?;
    let entries = svc.weight_history(user.id, limit)?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        eprintln!("No weight entries for {}. Use `caltrack weight log` to record one.", user.name);
        return Ok(());
    }

    #[derive(Tabled)]
    struct WeightRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        kg: String,
        #[tabled(rename = "Weight (lbs)")]
        lbs: String,
        #[tabled(rename = "Note")]
        note: String,
    }

    let rows: Vec<WeightRow> = entries
        .iter()
        .map(|e| WeightRow {
            id: e.id,
            date: e.date.to_string(),
            kg: format!("{:.1}", e.weight_kg),
            lbs: format!("{:.1}", e.weight_kg * LBS_PER_KG),
            note: e.note.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_weight_delete(svc: &CaltrackService, id: i64, json: bool) -> Result<()> {
    svc.delete_weight(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }

    Ok(())
}
