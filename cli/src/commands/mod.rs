mod favorite;
mod food;
mod helpers;
mod log;
mod meal;
mod summary;
mod user;
mod weight;

use anyhow::{Result, bail};

use caltrack_core::models::{Food, User};
use caltrack_core::service::{CaltrackService, FoodLookup, validate_query};

use helpers::{print_candidate_table, print_food_table, prompt_choice};

pub(crate) use favorite::{cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove};
pub(crate) use food::{FoodInput, cmd_food_add, cmd_food_barcode, cmd_food_list, cmd_food_search};
pub(crate) use log::{LogArgs, cmd_log};
pub(crate) use meal::{MealRange, cmd_delete, cmd_meals, cmd_update};
pub(crate) use summary::{cmd_summary, cmd_week};
pub(crate) use user::{cmd_user_add, cmd_user_goals, cmd_user_list};
pub(crate) use weight::{WeightInput, cmd_weight_delete, cmd_weight_history, cmd_weight_log};

/// Resolve the `--user` argument (name or id) to a profile.
pub(super) fn resolve_user(svc: &CaltrackService, user: &str) -> Result<User> {
    Ok(svc.find_user(user)?)
}

/// Resolve a food name to a catalog entry: local catalog first, then the
/// external database. An external pick is imported before it is returned.
pub(super) async fn resolve_food(
    svc: &CaltrackService,
    lookup: &dyn FoodLookup,
    food_query: &str,
) -> Result<Food> {
    let query = validate_query(food_query)?;

    let mut local = svc.list_foods(Some(&query))?;
    match local.len() {
        0 => {}
        1 => return Ok(local.remove(0)),
        n => {
            print_food_table(&local);
            let idx = prompt_choice(n)?;
            return Ok(local.swap_remove(idx));
        }
    }

    let mut remote = lookup.search(&query, 1).await?.products;
    let candidate = match remote.len() {
        0 => bail!("No food found for '{query}'"),
        1 => remote.remove(0),
        n => {
            print_candidate_table(&remote);
            let idx = prompt_choice(n)?;
            remote.swap_remove(idx)
        }
    };

    let (food, _) = svc.import_food(&candidate)?;
    Ok(food)
}
