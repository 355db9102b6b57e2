use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use caltrack_core::models::{Goals, UpdateGoals, User};
use caltrack_core::service::CaltrackService;

use super::helpers::print_json;
use super::resolve_user;

fn print_goals(user: &User) {
    let g = &user.goals;
    println!(
        "  Goals: {} kcal | P:{}g C:{}g F:{}g",
        g.calorie_goal, g.protein_goal_g, g.carbs_goal_g, g.fat_goal_g
    );
}

pub(crate) fn cmd_user_add(
    svc: &CaltrackService,
    name: &str,
    goals: UpdateGoals,
    json: bool,
) -> Result<()> {
    let user = svc.create_user(name, Some(goals.apply_to(Goals::default())))?;

    if json {
        print_json(&user)?;
    } else {
        println!("Added user: {} (id: {})", user.name, user.id);
        print_goals(&user);
    }

    Ok(())
}

pub(crate) fn cmd_user_list(svc: &CaltrackService, json: bool) -> Result<()> {
    let users = svc.list_users()?;

    if json {
        return print_json(&users);
    }

    if users.is_empty() {
        eprintln!("No users yet. Use `caltrack user add <name>` to create one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal")]
        kcal: i64,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            id: u.id,
            name: u.name.clone(),
            kcal: u.goals.calorie_goal,
            protein: format!("{}g", u.goals.protein_goal_g),
            carbs: format!("{}g", u.goals.carbs_goal_g),
            fat: format!("{}g", u.goals.fat_goal_g),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_user_goals(
    svc: &CaltrackService,
    user: &str,
    update: &UpdateGoals,
    json: bool,
) -> Result<()> {
    let user = resolve_user(svc, user)?;

    let user = if update.is_empty() {
        user
    } else {
        svc.update_goals(user.id, update)?
    };

    if json {
        print_json(&user)?;
    } else {
        if update.is_empty() && user.goals == Goals::default() {
            println!("{} uses the default goals", user.name);
        } else {
            println!("{}", user.name);
        }
        print_goals(&user);
    }

    Ok(())
}
