use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::db::{DEFAULT_WEIGHT_HISTORY, Database};
use crate::error::{Error, Result};
use crate::models::{
    DailySummary, Favorite, Food, FoodSource, Goals, MealEntry, NewFood, NewMealEntry, NewUser,
    NewWeightEntry, SearchPage, UpdateFood, UpdateGoals, UpdateMealEntry, User, WeeklySummary, WeightEntry,
    validate_food, validate_food_update, validate_goals, validate_name, validate_quantity,
    validate_weight,
};

/// Products requested per external search page.
pub const SEARCH_PAGE_SIZE: u32 = 20;

/// External food database used for name and barcode lookups.
///
/// Searches are paged, starting at page 1. The CLI implements this with reqwest against Open Food Facts. Results are
/// candidates and are not persisted until imported. Implementations report
/// transport failures as [`Error::LookupUnavailable`] and unknown barcodes as
/// [`Error::NotFound`].
#[async_trait]
pub trait FoodLookup: Send + Sync {
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage>;
    async fn lookup_barcode(&self, code: &str) -> Result<NewFood>;
}

/// Result of a barcode lookup: either a food already in the catalog or a
/// fresh external candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "origin", content = "food", rename_all = "lowercase")]
pub enum BarcodeMatch {
    Catalog(Food),
    External(NewFood),
}

/// Validating facade over [`Database`]. Every operation checks its inputs and
/// the existence of referenced users and foods before touching storage.
pub struct CaltrackService {
    db: Database,
}

impl CaltrackService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Users ---

    pub fn create_user(&self, name: &str, goals: Option<Goals>) -> Result<User> {
        let name = validate_name("name", name)?;
        let goals = goals.unwrap_or_default();
        validate_goals(&goals)?;
        let user = self.db.insert_user(&NewUser { name, goals })?;
        tracing::info!(user_id = user.id, name = %user.name, "created user");
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.db.get_user(id)
    }

    /// Resolve a profile given either its numeric id or its name.
    pub fn find_user(&self, name_or_id: &str) -> Result<User> {
        let key = name_or_id.trim();
        if let Ok(id) = key.parse::<i64>() {
            return self.db.get_user(id);
        }
        self.db
            .get_user_by_name(key)?
            .ok_or_else(|| Error::not_found(format!("User '{key}' not found")))
    }

    pub fn update_goals(&self, id: i64, update: &UpdateGoals) -> Result<User> {
        if update.is_empty() {
            return Err(Error::validation("At least one goal must be provided"));
        }
        let user = self.db.get_user(id)?;
        let goals = update.apply_to(user.goals);
        validate_goals(&goals)?;
        self.db.update_goals(id, &goals)
    }

    // --- Foods ---

    pub fn create_food(&self, food: &NewFood) -> Result<Food> {
        validate_food(food)?;
        let food = NewFood {
            name: food.name.trim().to_string(),
            source: FoodSource::Manual,
            external_id: None,
            ..food.clone()
        };
        self.db.insert_food(&food)
    }

    pub fn get_food(&self, id: i64) -> Result<Food> {
        self.db.get_food_by_id(id)
    }

    pub fn update_food(&self, id: i64, update: &UpdateFood) -> Result<Food> {
        validate_food_update(update)?;
        let mut update = update.clone();
        update.name = update.name.map(|n| n.trim().to_string());
        self.db.update_food(id, &update)
    }

    pub fn list_foods(&self, search: Option<&str>) -> Result<Vec<Food>> {
        self.db.list_foods(search)
    }

    /// Persist an external candidate, reusing the cached row for a known
    /// `external_id`. The flag is true when a new row was created.
    pub fn import_food(&self, candidate: &NewFood) -> Result<(Food, bool)> {
        validate_food(candidate)?;
        let candidate = NewFood {
            name: candidate.name.trim().to_string(),
            source: FoodSource::External,
            ..candidate.clone()
        };
        let (food, created) = self.db.import_food(&candidate)?;
        tracing::debug!(food_id = food.id, created, "imported food");
        Ok((food, created))
    }

    /// Catalog hit for a barcode previously imported from the external database.
    pub fn find_cached_barcode(&self, code: &str) -> Result<Option<Food>> {
        let code = validate_barcode(code)?;
        self.db.get_food_by_external_id(&code)
    }

    // --- Meals ---

    pub fn log_meal(&self, entry: &NewMealEntry) -> Result<MealEntry> {
        validate_quantity(entry.quantity_g)?;
        self.db.get_user(entry.user_id)?;
        self.db.get_food_by_id(entry.food_id)?;
        let entry = self.db.insert_meal_entry(entry)?;
        tracing::debug!(
            entry_id = entry.id,
            user_id = entry.user_id,
            food_id = entry.food_id,
            "logged meal"
        );
        Ok(entry)
    }

    pub fn get_meal(&self, id: i64) -> Result<MealEntry> {
        self.db.get_meal_entry(id)
    }

    pub fn update_meal(&self, id: i64, update: &UpdateMealEntry) -> Result<MealEntry> {
        if update.is_empty() {
            return Err(Error::validation("At least one field must be provided"));
        }
        if let Some(quantity_g) = update.quantity_g {
            validate_quantity(quantity_g)?;
        }
        self.db.update_meal_entry(id, update)
    }

    pub fn delete_meal(&self, id: i64) -> Result<()> {
        if !self.db.delete_meal_entry(id)? {
            return Err(Error::not_found(format!("Meal entry {id} not found")));
        }
        Ok(())
    }

    pub fn list_meals(
        &self,
        user_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<MealEntry>> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(Error::validation(format!(
                    "from ({from}) must not be after to ({to})"
                )));
            }
        }
        self.db.get_user(user_id)?;
        self.db.list_meal_entries(user_id, from, to)
    }

    pub fn daily_summary(&self, user_id: i64, date: NaiveDate) -> Result<DailySummary> {
        self.db.build_daily_summary(user_id, date)
    }

    pub fn weekly_summary(&self, user_id: i64, end: NaiveDate) -> Result<WeeklySummary> {
        self.db.build_weekly_summary(user_id, end)
    }

    // --- Weight ---

    pub fn log_weight(&self, entry: &NewWeightEntry) -> Result<WeightEntry> {
        validate_weight(entry.weight_kg)?;
        self.db.get_user(entry.user_id)?;
        let entry = NewWeightEntry {
            note: entry
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ToString::to_string),
            ..entry.clone()
        };
        self.db.upsert_weight(&entry)
    }

    pub fn weight_history(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<WeightEntry>> {
        let limit = limit.unwrap_or(DEFAULT_WEIGHT_HISTORY);
        if limit <= 0 {
            return Err(Error::validation("limit must be greater than 0"));
        }
        self.db.get_user(user_id)?;
        self.db.get_weight_history(user_id, Some(limit))
    }

    pub fn delete_weight(&self, id: i64) -> Result<()> {
        self.db.delete_weight(id)
    }

    // --- Favorites ---

    pub fn add_favorite(&self, user_id: i64, food_id: i64) -> Result<Favorite> {
        self.db.get_user(user_id)?;
        self.db.get_food_by_id(food_id)?;
        self.db.add_favorite(user_id, food_id)
    }

    pub fn remove_favorite(&self, user_id: i64, food_id: i64) -> Result<()> {
        if !self.db.remove_favorite(user_id, food_id)? {
            return Err(Error::not_found(format!(
                "Food {food_id} is not a favorite of user {user_id}"
            )));
        }
        Ok(())
    }

    pub fn list_favorites(&self, user_id: i64) -> Result<Vec<Food>> {
        self.db.get_user(user_id)?;
        self.db.list_favorites(user_id)
    }
}

/// Barcodes are digit strings; surrounding whitespace is ignored.
pub fn validate_barcode(code: &str) -> Result<String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation(format!(
            "Invalid barcode '{code}'. Use digits only"
        )));
    }
    Ok(code.to_string())
}

/// Search terms must contain something besides whitespace.
pub fn validate_query(query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::validation("query must not be empty"));
    }
    Ok(query.to_string())
}

/// Search pages are 1-based; a missing page means the first.
pub fn validate_page(page: Option<u32>) -> Result<u32> {
    match page.unwrap_or(1) {
        0 => Err(Error::validation("page must be at least 1")),
        page => Ok(page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealSlot;

    fn date(s: &str) -> NaiveDate {
        crate::models::parse_date(s).unwrap()
    }

    fn sample_food() -> NewFood {
        NewFood {
            name: "Test Food".to_string(),
            brand: Some("Brand".to_string()),
            barcode: Some("1234567890".to_string()),
            kcal_per_100g: 100.0,
            protein_g: 10.0,
            carbs_g: 20.0,
            fat_g: 5.0,
            fiber_g: Some(3.0),
            sugar_g: None,
            source: FoodSource::Manual,
            external_id: None,
            image_url: None,
        }
    }

    fn external_food() -> NewFood {
        NewFood {
            source: FoodSource::External,
            external_id: Some("1234567890".to_string()),
            ..sample_food()
        }
    }

    fn setup() -> (CaltrackService, User, Food) {
        let svc = CaltrackService::new_in_memory().unwrap();
        let user = svc.create_user("Anna", None).unwrap();
        let food = svc.create_food(&sample_food()).unwrap();
        (svc, user, food)
    }

    fn meal(user: &User, food: &Food, day: &str, quantity_g: f64) -> NewMealEntry {
        NewMealEntry {
            user_id: user.id,
            food_id: food.id,
            date: date(day),
            meal_slot: MealSlot::Lunch,
            quantity_g,
        }
    }

    #[test]
    fn test_create_user_defaults_and_validation() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let user = svc.create_user("  Anna ", None).unwrap();
        assert_eq!(user.name, "Anna");
        assert_eq!(user.goals.calorie_goal, 2000);

        assert!(matches!(svc.create_user("  ", None), Err(Error::Validation(_))));
        assert!(matches!(svc.create_user("Anna", None), Err(Error::Conflict(_))));

        let bad_goals = Goals {
            fat_goal_g: 0,
            ..Goals::default()
        };
        assert!(matches!(
            svc.create_user("Ben", Some(bad_goals)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_find_user_by_name_or_id() {
        let (svc, user, _) = setup();
        assert_eq!(svc.find_user("anna").unwrap().id, user.id);
        assert_eq!(svc.find_user(&user.id.to_string()).unwrap().name, "Anna");
        assert!(matches!(svc.find_user("Zed"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_goals_partial() {
        let (svc, user, _) = setup();
        let updated = svc
            .update_goals(
                user.id,
                &UpdateGoals {
                    protein_goal_g: Some(120),
                    ..UpdateGoals::default()
                },
            )
            .unwrap();
        assert_eq!(updated.goals.protein_goal_g, 120);
        assert_eq!(updated.goals.calorie_goal, 2000);

        let empty = svc.update_goals(user.id, &UpdateGoals::default());
        assert!(matches!(empty, Err(Error::Validation(_))));

        let negative = UpdateGoals {
            calorie_goal: Some(-5),
            ..UpdateGoals::default()
        };
        assert!(matches!(
            svc.update_goals(user.id, &negative),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_create_food_forces_manual_source() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let food = svc.create_food(&external_food()).unwrap();
        assert_eq!(food.source, FoodSource::Manual);
        assert!(food.external_id.is_none());

        let mut bad = sample_food();
        bad.protein_g = -1.0;
        assert!(matches!(svc.create_food(&bad), Err(Error::Validation(_))));
    }

    #[test]
    fn test_update_food_requires_a_field() {
        let (svc, _, food) = setup();
        let err = svc.update_food(food.id, &UpdateFood::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let renamed = svc
            .update_food(
                food.id,
                &UpdateFood {
                    name: Some(" Renamed ".to_string()),
                    ..UpdateFood::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Renamed");

        let missing = svc.update_food(
            999,
            &UpdateFood {
                fat_g: Some(1.0),
                ..UpdateFood::default()
            },
        );
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_import_twice_keeps_one_row() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let (first, created) = svc.import_food(&external_food()).unwrap();
        assert!(created);
        let (second, created) = svc.import_food(&external_food()).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(svc.list_foods(None).unwrap().len(), 1);
    }

    #[test]
    fn test_find_cached_barcode() {
        let svc = CaltrackService::new_in_memory().unwrap();
        assert!(svc.find_cached_barcode("1234567890").unwrap().is_none());

        let (food, _) = svc.import_food(&external_food()).unwrap();
        let cached = svc.find_cached_barcode(" 1234567890 ").unwrap().unwrap();
        assert_eq!(cached.id, food.id);

        assert!(matches!(
            svc.find_cached_barcode("12ab"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_log_meal_checks_references() {
        let (svc, user, food) = setup();
        let entry = svc.log_meal(&meal(&user, &food, "2024-06-15", 200.0)).unwrap();
        assert_eq!(entry.quantity_g, 200.0);

        let mut unknown_user = meal(&user, &food, "2024-06-15", 100.0);
        unknown_user.user_id = 999;
        assert!(matches!(svc.log_meal(&unknown_user), Err(Error::NotFound(_))));

        let mut unknown_food = meal(&user, &food, "2024-06-15", 100.0);
        unknown_food.food_id = 999;
        assert!(matches!(svc.log_meal(&unknown_food), Err(Error::NotFound(_))));

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY, 1e308, 100_000.5] {
            let result = svc.log_meal(&meal(&user, &food, "2024-06-15", bad));
            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_log_meal_and_summary() {
        let (svc, user, food) = setup();
        svc.log_meal(&meal(&user, &food, "2024-06-15", 200.0)).unwrap();

        let summary = svc.daily_summary(user.id, date("2024-06-15")).unwrap();
        assert_eq!(summary.meals.len(), 1);
        assert!((summary.totals.kcal - 200.0).abs() < 0.01);
        assert!((summary.totals.protein_g - 20.0).abs() < 0.01);
        assert!((summary.remaining.kcal - 1800.0).abs() < 0.01);
    }

    #[test]
    fn test_delete_meal_restores_totals() {
        let (svc, user, food) = setup();
        let day = date("2024-06-15");
        svc.log_meal(&meal(&user, &food, "2024-06-15", 50.0)).unwrap();
        let before = svc.daily_summary(user.id, day).unwrap().totals;

        let entry = svc.log_meal(&meal(&user, &food, "2024-06-15", 75.0)).unwrap();
        svc.delete_meal(entry.id).unwrap();
        assert_eq!(svc.daily_summary(user.id, day).unwrap().totals, before);

        assert!(matches!(svc.delete_meal(entry.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_meal_validation() {
        let (svc, user, food) = setup();
        let entry = svc.log_meal(&meal(&user, &food, "2024-06-15", 50.0)).unwrap();

        let empty = svc.update_meal(entry.id, &UpdateMealEntry::default());
        assert!(matches!(empty, Err(Error::Validation(_))));

        let zero = UpdateMealEntry {
            quantity_g: Some(0.0),
            ..UpdateMealEntry::default()
        };
        assert!(matches!(
            svc.update_meal(entry.id, &zero),
            Err(Error::Validation(_))
        ));

        let moved = UpdateMealEntry {
            date: Some(date("2024-06-16")),
            ..UpdateMealEntry::default()
        };
        let updated = svc.update_meal(entry.id, &moved).unwrap();
        assert_eq!(updated.date, date("2024-06-16"));
        assert_eq!(updated.quantity_g, 50.0);
    }

    #[test]
    fn test_list_meals_rejects_inverted_range() {
        let (svc, user, _) = setup();
        let result = svc.list_meals(user.id, Some(date("2024-06-20")), Some(date("2024-06-10")));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(matches!(
            svc.list_meals(42, None, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_weekly_summary_empty() {
        let (svc, user, _) = setup();
        let week = svc.weekly_summary(user.id, date("2024-06-16")).unwrap();
        assert_eq!(week.days.len(), 7);
        assert!(week.totals.is_zero());
    }

    #[test]
    fn test_log_weight_overwrites_same_date() {
        let (svc, user, _) = setup();
        let entry = NewWeightEntry {
            user_id: user.id,
            date: date("2025-01-15"),
            weight_kg: 80.0,
            note: Some("  ".to_string()),
        };
        let first = svc.log_weight(&entry).unwrap();
        assert!(first.note.is_none());

        let second = svc
            .log_weight(&NewWeightEntry {
                weight_kg: 79.5,
                note: Some("after run".to_string()),
                ..entry.clone()
            })
            .unwrap();
        assert_eq!(first.id, second.id);

        let history = svc.weight_history(user.id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert!((history[0].weight_kg - 79.5).abs() < f64::EPSILON);
        assert_eq!(history[0].note.as_deref(), Some("after run"));
    }

    #[test]
    fn test_log_weight_validation() {
        let (svc, user, _) = setup();
        let bad = NewWeightEntry {
            user_id: user.id,
            date: date("2025-01-15"),
            weight_kg: 0.0,
            note: None,
        };
        assert!(matches!(svc.log_weight(&bad), Err(Error::Validation(_))));

        let unknown = NewWeightEntry {
            user_id: 77,
            weight_kg: 70.0,
            ..bad
        };
        assert!(matches!(svc.log_weight(&unknown), Err(Error::NotFound(_))));
        assert!(matches!(
            svc.weight_history(user.id, Some(0)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_weight_history_default_limit() {
        let (svc, user, _) = setup();
        let start = date("2025-01-01");
        for (day, offset) in start.iter_days().zip(0..40) {
            svc.log_weight(&NewWeightEntry {
                user_id: user.id,
                date: day,
                weight_kg: 80.0 - f64::from(offset) * 0.1,
                note: None,
            })
            .unwrap();
        }
        let history = svc.weight_history(user.id, None).unwrap();
        assert_eq!(history.len(), 30);
        assert_eq!(history[0].date, date("2025-02-09"));
    }

    #[test]
    fn test_favorites() {
        let (svc, user, food) = setup();
        svc.add_favorite(user.id, food.id).unwrap();
        assert!(matches!(
            svc.add_favorite(user.id, food.id),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            svc.add_favorite(user.id, 999),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.add_favorite(999, food.id),
            Err(Error::NotFound(_))
        ));

        assert_eq!(svc.list_favorites(user.id).unwrap().len(), 1);
        svc.remove_favorite(user.id, food.id).unwrap();
        assert!(svc.list_favorites(user.id).unwrap().is_empty());
        assert!(matches!(
            svc.remove_favorite(user.id, food.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_validate_barcode_and_query() {
        assert_eq!(validate_barcode(" 3017620422003 ").unwrap(), "3017620422003");
        assert!(validate_barcode("").is_err());
        assert!(validate_barcode("30-17").is_err());
        assert_eq!(validate_query("  oats ").unwrap(), "oats");
        assert!(validate_query("   ").is_err());
    }

    #[test]
    fn test_validate_page() {
        assert_eq!(validate_page(None).unwrap(), 1);
        assert_eq!(validate_page(Some(3)).unwrap(), 3);
        assert!(matches!(validate_page(Some(0)), Err(Error::Validation(_))));
    }

    #[test]
    fn test_create_food_keeps_optional_nutrients() {
        let svc = CaltrackService::new_in_memory().unwrap();
        let food = svc.create_food(&sample_food()).unwrap();
        assert_eq!(food.fiber_g, Some(3.0));
        assert_eq!(food.sugar_g, None);

        let mut bad = sample_food();
        bad.sugar_g = Some(-1.0);
        assert!(matches!(svc.create_food(&bad), Err(Error::Validation(_))));
    }

    #[test]
    fn test_log_meal_upper_quantity_bound() {
        let (svc, user, food) = setup();
        let entry = svc.log_meal(&meal(&user, &food, "2024-06-15", 100_000.0)).unwrap();
        assert_eq!(entry.quantity_g, 100_000.0);

        let summary = svc.daily_summary(user.id, date("2024-06-15")).unwrap();
        assert!(summary.totals.kcal.is_finite());
        let json = serde_json::to_value(&summary.totals).unwrap();
        assert!(json["kcal"].is_number());
    }

    #[test]
    fn test_barcode_match_serializes_with_origin() {
        let json = serde_json::to_value(BarcodeMatch::External(external_food())).unwrap();
        assert_eq!(json["origin"], "external");
        assert_eq!(json["food"]["name"], "Test Food");
    }
}
