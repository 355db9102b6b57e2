use anyhow::Result;

use caltrack_core::service::CaltrackService;

use super::helpers::{print_food_table, print_json};
use super::resolve_user;

pub(crate) fn cmd_favorite_add(
    svc: &CaltrackService,
    user: &str,
    food_id: i64,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, user)?;
    let favorite = svc.add_favorite(user.id, food_id)?;

    if json {
        print_json(&favorite)?;
    } else {
        let food = svc.get_food(food_id)?;
        println!("Added {} to {}'s favorites", food.name, user.name);
    }

    Ok(())
}

pub(crate) fn cmd_favorite_remove(
    svc: &CaltrackService,
    user: &str,
    food_id: i64,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, user)?;
    svc.remove_favorite(user.id, food_id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "user_id": user.id, "food_id": food_id, "removed": true })
        );
    } else {
        println!("Removed food {food_id} from {}'s favorites", user.name);
    }

    Ok(())
}

pub(crate) fn cmd_favorite_list(svc: &CaltrackService, user: &str, json: bool) -> Result<()> {
    let user = resolve_user(svc, user)?;
    let foods = svc.list_favorites(user.id)?;

    if json {
        return print_json(&foods);
    }

    if foods.is_empty() {
        eprintln!("{} has no favorites yet", user.name);
        return Ok(());
    }

    print_food_table(&foods);
    Ok(())
}
