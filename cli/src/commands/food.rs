use anyhow::Result;
use std::process;

use caltrack_core::models::{FoodSource, NewFood};
use caltrack_core::service::{
    BarcodeMatch, CaltrackService, FoodLookup, validate_page, validate_query,
};

use super::helpers::{print_candidate_table, print_food_table, print_json};

pub(crate) struct FoodInput {
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub kcal: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
}

pub(crate) fn cmd_food_add(svc: &CaltrackService, input: FoodInput, json: bool) -> Result<()> {
    let food = svc.create_food(&NewFood {
        name: input.name,
        brand: input.brand,
        barcode: input.barcode,
        kcal_per_100g: input.kcal,
        protein_g: input.protein,
        carbs_g: input.carbs,
        fat_g: input.fat,
        fiber_g: input.fiber,
        sugar_g: input.sugar,
        source: FoodSource::Manual,
        external_id: None,
        image_url: None,
    })?;

    if json {
        print_json(&food)?;
    } else {
        println!("Added food: {} (id: {})", food.name, food.id);
    }

    Ok(())
}

pub(crate) fn cmd_food_list(svc: &CaltrackService, search: Option<&str>, json: bool) -> Result<()> {
    let foods = svc.list_foods(search)?;

    if json {
        return print_json(&foods);
    }

    if foods.is_empty() {
        eprintln!("No foods found");
        process::exit(2);
    }

    print_food_table(&foods);
    Ok(())
}

/// Search the external database, one page at a time. With `save`, every
/// candidate on the page is imported.
pub(crate) async fn cmd_food_search(
    svc: &CaltrackService,
    lookup: &dyn FoodLookup,
    query: &str,
    page: Option<u32>,
    save: bool,
    json: bool,
) -> Result<()> {
    let query = validate_query(query)?;
    let page = validate_page(page)?;
    let results = lookup.search(&query, page).await?;
    let candidates = &results.products;

    if candidates.is_empty() {
        if json {
            print_json(&results)?;
        } else {
            eprintln!("No results found for '{query}' on page {page}");
        }
        process::exit(2);
    }

    if save {
        let mut foods = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            foods.push(svc.import_food(candidate)?.0);
        }
        if json {
            return print_json(&foods);
        }
        print_food_table(&foods);
        return Ok(());
    }

    if json {
        print_json(&results)?;
    } else {
        print_candidate_table(candidates);
        eprintln!(
            "Page {page}: showing {} of {} results. Use --page for more, --save to add these to the local catalog.",
            candidates.len(),
            results.count
        );
    }

    Ok(())
}

pub(crate) async fn cmd_food_barcode(
    svc: &CaltrackService,
    lookup: &dyn FoodLookup,
    code: &str,
    save: bool,
    json: bool,
) -> Result<()> {
    let found = match svc.find_cached_barcode(code)? {
        Some(food) => BarcodeMatch::Catalog(food),
        None => {
            let candidate = lookup.lookup_barcode(code.trim()).await?;
            if save {
                BarcodeMatch::Catalog(svc.import_food(&candidate)?.0)
            } else {
                BarcodeMatch::External(candidate)
            }
        }
    };

    if json {
        return print_json(&found);
    }

    match found {
        BarcodeMatch::Catalog(food) => print_food_table(&[food]),
        BarcodeMatch::External(candidate) => {
            print_candidate_table(std::slice::from_ref(&candidate));
            eprintln!("Not in the local catalog yet. Use --save to import it.");
        }
    }

    Ok(())
}
