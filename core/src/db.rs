use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Error, Result};
use crate::models::{
    DailySummary, DayTotals, Favorite, Food, FoodSource, Goals, Macros, MealEntry,
    MealEntryView, MealGroup, MealSlot, NewFood, NewMealEntry, NewUser, NewWeightEntry,
    UpdateFood, UpdateMealEntry, User, WeeklySummary, WeightEntry,
};

/// Number of days covered by a weekly summary, end date included.
pub const WEEK_DAYS: i64 = 7;

/// Default number of weight entries returned by a history query.
pub const DEFAULT_WEIGHT_HISTORY: i64 = 30;

const USER_COLUMNS: &str =
    "id, name, calorie_goal, protein_goal_g, carbs_goal_g, fat_goal_g, created_at";

const FOOD_COLUMNS: &str = "f.id, f.name, f.brand, f.barcode, f.kcal_per_100g, f.protein_g,
     f.carbs_g, f.fat_g, f.source, f.external_id, f.image_url, f.created_at, f.updated_at,
     f.fiber_g, f.sugar_g";

const MEAL_COLUMNS: &str = "id, user_id, food_id, date, meal_slot, quantity_g, food_name,
     food_brand, kcal_per_100g, protein_g, carbs_g, fat_g, created_at";

const WEIGHT_COLUMNS: &str = "id, user_id, date, weight_kg, note, created_at, updated_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            tracing::debug!(from = version, to = 1, "migrating database schema");
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    calorie_goal INTEGER NOT NULL,
                    protein_goal_g INTEGER NOT NULL,
                    carbs_goal_g INTEGER NOT NULL,
                    fat_goal_g INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    brand TEXT,
                    barcode TEXT,
                    kcal_per_100g REAL NOT NULL CHECK (kcal_per_100g >= 0),
                    protein_g REAL NOT NULL DEFAULT 0 CHECK (protein_g >= 0),
                    carbs_g REAL NOT NULL DEFAULT 0 CHECK (carbs_g >= 0),
                    fat_g REAL NOT NULL DEFAULT 0 CHECK (fat_g >= 0),
                    source TEXT NOT NULL CHECK (source IN ('manual', 'external')),
                    external_id TEXT UNIQUE,
                    image_url TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    date TEXT NOT NULL,
                    meal_slot TEXT NOT NULL
                        CHECK (meal_slot IN ('breakfast', 'lunch', 'dinner', 'snack')),
                    quantity_g REAL NOT NULL CHECK (quantity_g > 0),
                    food_name TEXT NOT NULL,
                    food_brand TEXT,
                    kcal_per_100g REAL NOT NULL,
                    protein_g REAL NOT NULL,
                    carbs_g REAL NOT NULL,
                    fat_g REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    weight_kg REAL NOT NULL CHECK (weight_kg > 0),
                    note TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, date)
                );

                CREATE TABLE IF NOT EXISTS favorites (
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, food_id)
                );

                CREATE INDEX IF NOT EXISTS idx_meal_entries_user_date ON meal_entries(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);
                CREATE INDEX IF NOT EXISTS idx_foods_barcode ON foods(barcode);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            tracing::debug!(from = version.max(1), to = 2, "migrating database schema");
            self.conn.execute_batch(
                "ALTER TABLE foods ADD COLUMN fiber_g REAL CHECK (fiber_g >= 0);
                 ALTER TABLE foods ADD COLUMN sugar_g REAL CHECK (sugar_g >= 0);
                 PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            goals: Goals {
                calorie_goal: row.get(2)?,
                protein_goal_g: row.get(3)?,
                carbs_goal_g: row.get(4)?,
                fat_goal_g: row.get(5)?,
            },
            created_at: row.get(6)?,
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            name: row.get(1)?,
            brand: row.get(2)?,
            barcode: row.get(3)?,
            kcal_per_100g: row.get(4)?,
            protein_g: row.get(5)?,
            carbs_g: row.get(6)?,
            fat_g: row.get(7)?,
            source: row.get(8)?,
            external_id: row.get(9)?,
            image_url: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            fiber_g: row.get(13)?,
            sugar_g: row.get(14)?,
        })
    }

    // Column order follows MEAL_COLUMNS; 8..=11 are the per-100 g snapshot.
    fn meal_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealEntry> {
        Ok(MealEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            food_id: row.get(2)?,
            date: row.get(3)?,
            meal_slot: row.get(4)?,
            quantity_g: row.get(5)?,
            food_name: row.get(6)?,
            food_brand: row.get(7)?,
            per_100g: Macros::new(row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?),
            created_at: row.get(12)?,
        })
    }

    fn weight_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            weight_kg: row.get(3)?,
            note: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn now() -> String {
        Local::now().to_rfc3339()
    }

    // --- Users ---

    pub fn insert_user(&self, user: &NewUser) -> Result<User> {
        let goals = &user.goals;
        self.conn
            .execute(
                "INSERT INTO users (name, calorie_goal, protein_goal_g, carbs_goal_g, fat_goal_g, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.name,
                    goals.calorie_goal,
                    goals.protein_goal_g,
                    goals.carbs_goal_g,
                    goals.fat_goal_g,
                    Self::now(),
                ],
            )
            .map_err(|e| unique_as_conflict(e, || format!("User '{}' already exists", user.name)))?;
        self.get_user(self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                Self::user_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("User {id} not found")))
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1 COLLATE NOCASE"),
                params![name],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn update_goals(&self, id: i64, goals: &Goals) -> Result<User> {
        let rows = self.conn.execute(
            "UPDATE users SET calorie_goal = ?1, protein_goal_g = ?2, carbs_goal_g = ?3, fat_goal_g = ?4
             WHERE id = ?5",
            params![
                goals.calorie_goal,
                goals.protein_goal_g,
                goals.carbs_goal_g,
                goals.fat_goal_g,
                id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::not_found(format!("User {id} not found")));
        }
        self.get_user(id)
    }

    // --- Foods ---

    pub fn insert_food(&self, food: &NewFood) -> Result<Food> {
        let now = Self::now();
        self.conn
            .execute(
                "INSERT INTO foods (name, brand, barcode, kcal_per_100g, protein_g, carbs_g, fat_g,
                                    fiber_g, sugar_g, source, external_id, image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    food.name,
                    food.brand,
                    food.barcode,
                    food.kcal_per_100g,
                    food.protein_g,
                    food.carbs_g,
                    food.fat_g,
                    food.fiber_g,
                    food.sugar_g,
                    food.source,
                    food.external_id,
                    food.image_url,
                    now,
                    now,
                ],
            )
            .map_err(|e| {
                unique_as_conflict(e, || {
                    format!(
                        "Food with external id '{}' already exists",
                        food.external_id.as_deref().unwrap_or_default()
                    )
                })
            })?;
        self.get_food_by_id(self.conn.last_insert_rowid())
    }

    /// Persist an external candidate, returning the cached row when one with the
    /// same `external_id` already exists. The flag is true when a row was created.
    pub fn import_food(&self, food: &NewFood) -> Result<(Food, bool)> {
        let tx = self.conn.unchecked_transaction()?;
        if let Some(external_id) = &food.external_id {
            if let Some(existing) = self.get_food_by_external_id(external_id)? {
                return Ok((existing, false));
            }
        }
        let created = self.insert_food(food)?;
        tx.commit()?;
        Ok((created, true))
    }

    pub fn get_food_by_id(&self, id: i64) -> Result<Food> {
        self.conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} FROM foods f WHERE f.id = ?1"),
                params![id],
                Self::food_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("Food {id} not found")))
    }

    pub fn get_food_by_external_id(&self, external_id: &str) -> Result<Option<Food>> {
        let food = self
            .conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} FROM foods f WHERE f.external_id = ?1"),
                params![external_id],
                Self::food_from_row,
            )
            .optional()?;
        Ok(food)
    }

    pub fn search_foods_local(&self, query: &str) -> Result<Vec<Food>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods f
             WHERE f.name LIKE ?1 ESCAPE '\\' OR f.brand LIKE ?1 ESCAPE '\\'
             ORDER BY f.name, f.id"
        ))?;
        let foods = stmt
            .query_map(params![pattern], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn list_foods(&self, search: Option<&str>) -> Result<Vec<Food>> {
        if let Some(query) = search.filter(|q| !q.trim().is_empty()) {
            return self.search_foods_local(query.trim());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods f ORDER BY f.name, f.id"
        ))?;
        let foods = stmt
            .query_map([], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Edit a catalog entry. Meal entries keep their own macro snapshot, so
    /// historical totals are unaffected.
    /// An empty `brand` in the update clears the stored brand.
    pub fn update_food(&self, id: i64, update: &UpdateFood) -> Result<Food> {
        let current = self.get_food_by_id(id)?;
        let brand = match update.brand.as_deref().map(str::trim) {
            Some("") => None,
            Some(brand) => Some(brand),
            None => current.brand.as_deref(),
        };
        self.conn.execute(
            "UPDATE foods SET name = ?1, brand = ?2, kcal_per_100g = ?3, protein_g = ?4,
                    carbs_g = ?5, fat_g = ?6, fiber_g = ?7, sugar_g = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                update.name.as_ref().unwrap_or(&current.name),
                brand,
                update.kcal_per_100g.unwrap_or(current.kcal_per_100g),
                update.protein_g.unwrap_or(current.protein_g),
                update.carbs_g.unwrap_or(current.carbs_g),
                update.fat_g.unwrap_or(current.fat_g),
                update.fiber_g.or(current.fiber_g),
                update.sugar_g.or(current.sugar_g),
                Self::now(),
                id,
            ],
        )?;
        self.get_food_by_id(id)
    }

    // --- Meal Entries ---

    pub fn insert_meal_entry(&self, entry: &NewMealEntry) -> Result<MealEntry> {
        let food = self.get_food_by_id(entry.food_id)?;
        self.conn.execute(
            "INSERT INTO meal_entries (user_id, food_id, date, meal_slot, quantity_g, food_name, food_brand,
                                       kcal_per_100g, protein_g, carbs_g, fat_g, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.user_id,
                entry.food_id,
                entry.date,
                entry.meal_slot,
                entry.quantity_g,
                food.name,
                food.brand,
                food.kcal_per_100g,
                food.protein_g,
                food.carbs_g,
                food.fat_g,
                Self::now(),
            ],
        )?;
        self.get_meal_entry(self.conn.last_insert_rowid())
    }

    pub fn get_meal_entry(&self, id: i64) -> Result<MealEntry> {
        self.conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM meal_entries WHERE id = ?1"),
                params![id],
                Self::meal_entry_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("Meal entry {id} not found")))
    }

    pub fn delete_meal_entry(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM meal_entries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn update_meal_entry(&self, id: i64, update: &UpdateMealEntry) -> Result<MealEntry> {
        let current = self.get_meal_entry(id)?;
        self.conn.execute(
            "UPDATE meal_entries SET quantity_g = ?1, meal_slot = ?2, date = ?3 WHERE id = ?4",
            params![
                update.quantity_g.unwrap_or(current.quantity_g),
                update.meal_slot.unwrap_or(current.meal_slot),
                update.date.unwrap_or(current.date),
                id,
            ],
        )?;
        self.get_meal_entry(id)
    }

    pub fn get_entries_for_date(&self, user_id: i64, date: NaiveDate) -> Result<Vec<MealEntry>> {
        self.get_entries_between(user_id, date, date)
    }

    /// Entries for `user_id` with `from <= date <= to`, oldest first.
    pub fn get_entries_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MealEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal_entries
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, id"
        ))?;
        let entries = stmt
            .query_map(params![user_id, from, to], Self::meal_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// A user's entries, newest date first, optionally bounded on either side.
    pub fn list_meal_entries(
        &self,
        user_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<MealEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal_entries
             WHERE user_id = ?1
               AND (?2 IS NULL OR date >= ?2)
               AND (?3 IS NULL OR date <= ?3)
             ORDER BY date DESC, id DESC"
        ))?;
        let entries = stmt
            .query_map(params![user_id, from, to], Self::meal_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // --- Aggregation ---

    pub fn build_daily_summary(&self, user_id: i64, date: NaiveDate) -> Result<DailySummary> {
        let user = self.get_user(user_id)?;
        let entries = self.get_entries_for_date(user_id, date)?;

        let mut meals: Vec<MealGroup> = Vec::new();
        let mut totals = Macros::default();

        for slot in MealSlot::ALL {
            let slot_entries: Vec<MealEntry> = entries
                .iter()
                .filter(|e| e.meal_slot == slot)
                .cloned()
                .collect();

            if slot_entries.is_empty() {
                continue;
            }

            let subtotal: Macros = slot_entries.iter().map(MealEntry::contribution).sum();
            totals += subtotal;

            meals.push(MealGroup {
                meal_slot: slot,
                entries: slot_entries.into_iter().map(MealEntryView::from).collect(),
                subtotal: subtotal.rounded(),
            });
        }

        Ok(DailySummary {
            user_id,
            date,
            meals,
            totals: totals.rounded(),
            goals: user.goals,
            remaining: user.goals.as_macros().minus(&totals).rounded(),
        })
    }

    /// Totals for the trailing week ending on `end` (inclusive), per day and overall.
    pub fn build_weekly_summary(&self, user_id: i64, end: NaiveDate) -> Result<WeeklySummary> {
        self.get_user(user_id)?;
        let start = end
            .checked_sub_signed(Duration::days(WEEK_DAYS - 1))
            .ok_or_else(|| Error::validation("end date out of range"))?;
        let entries = self.get_entries_between(user_id, start, end)?;

        let mut days = Vec::with_capacity(WEEK_DAYS as usize);
        let mut totals = Macros::default();

        for date in start.iter_days().take(WEEK_DAYS as usize) {
            let day_entries: Vec<&MealEntry> = entries.iter().filter(|e| e.date == date).collect();
            let day_total: Macros = day_entries.iter().map(|e| e.contribution()).sum();
            totals += day_total;
            days.push(DayTotals {
                date,
                entry_count: day_entries.len(),
                totals: day_total.rounded(),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let daily_average = totals.divided_by(WEEK_DAYS as f64).rounded();

        Ok(WeeklySummary {
            user_id,
            start,
            end,
            days,
            totals: totals.rounded(),
            daily_average,
        })
    }

    // --- Weight Entries ---

    pub fn upsert_weight(&self, entry: &NewWeightEntry) -> Result<WeightEntry> {
        let now = Self::now();
        self.conn.execute(
            "INSERT INTO weight_entries (user_id, date, weight_kg, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, date) DO UPDATE SET
                weight_kg = excluded.weight_kg,
                note = excluded.note,
                updated_at = excluded.updated_at",
            params![entry.user_id, entry.date, entry.weight_kg, entry.note, now, now],
        )?;
        self.get_weight(entry.user_id, entry.date)?
            .context("Weight entry not found after upsert")
            .map_err(Error::from)
    }

    pub fn get_weight(&self, user_id: i64, date: NaiveDate) -> Result<Option<WeightEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {WEIGHT_COLUMNS} FROM weight_entries WHERE user_id = ?1 AND date = ?2"
                ),
                params![user_id, date],
                Self::weight_entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Newest first. `None` returns the whole history.
    pub fn get_weight_history(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<WeightEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WEIGHT_COLUMNS} FROM weight_entries
             WHERE user_id = ?1 ORDER BY date DESC LIMIT ?2"
        ))?;
        // SQLite treats a negative LIMIT as unbounded.
        let entries = stmt
            .query_map(params![user_id, limit.unwrap_or(-1)], Self::weight_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn delete_weight(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM weight_entries WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::not_found(format!("Weight entry {id} not found")));
        }
        Ok(())
    }

    // --- Favorites ---

    pub fn add_favorite(&self, user_id: i64, food_id: i64) -> Result<Favorite> {
        let now = Self::now();
        self.conn
            .execute(
                "INSERT INTO favorites (user_id, food_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, food_id, now],
            )
            .map_err(|e| {
                unique_as_conflict(e, || {
                    format!("Food {food_id} is already a favorite of user {user_id}")
                })
            })?;
        Ok(Favorite {
            user_id,
            food_id,
            created_at: now,
        })
    }

    pub fn remove_favorite(&self, user_id: i64, food_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND food_id = ?2",
            params![user_id, food_id],
        )?;
        Ok(rows > 0)
    }

    pub fn list_favorites(&self, user_id: i64) -> Result<Vec<Food>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM favorites fav
             JOIN foods f ON f.id = fav.food_id
             WHERE fav.user_id = ?1
             ORDER BY f.name"
        ))?;
        let foods = stmt
            .query_map(params![user_id], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn count_foods_by_source(&self, source: FoodSource) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM foods WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn unique_as_conflict(err: rusqlite::Error, message: impl FnOnce() -> String) -> Error {
    let err = Error::from(err);
    if err.is_unique_violation() {
        Error::Conflict(message())
    } else {
        err
    }
}
