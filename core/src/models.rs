use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    /// Display order used when grouping a day's entries.
    pub const ALL: [MealSlot; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                Error::validation(format!(
                    "Invalid meal slot '{s}'. Must be one of: {}",
                    names.join(", ")
                ))
            })
    }
}

impl ToSql for MealSlot {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MealSlot {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodSource {
    Manual,
    External,
}

impl FoodSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::External => "external",
        }
    }
}

impl ToSql for FoodSource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FoodSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "manual" => Ok(Self::Manual),
            "external" => Ok(Self::External),
            other => Err(FromSqlError::Other(
                format!("unknown food source '{other}'").into(),
            )),
        }
    }
}

// --- Macro arithmetic ---

/// Round half away from zero to two decimal places.
///
/// Every aggregate exposed by the API goes through this so totals are
/// reproducible across runs and clients.
#[must_use]
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid emitting -0.0 for tiny negative remainders.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// kcal, protein, carbs and fat, either per 100 g or as absolute amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl Macros {
    #[must_use]
    pub fn new(kcal: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            kcal,
            protein_g,
            carbs_g,
            fat_g,
        }
    }

    /// Contribution of `quantity_g` grams of a food with these per-100 g values.
    #[must_use]
    pub fn for_quantity(&self, quantity_g: f64) -> Self {
        let factor = quantity_g / 100.0;
        Self {
            kcal: self.kcal * factor,
            protein_g: self.protein_g * factor,
            carbs_g: self.carbs_g * factor,
            fat_g: self.fat_g * factor,
        }
    }

    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            kcal: round2(self.kcal),
            protein_g: round2(self.protein_g),
            carbs_g: round2(self.carbs_g),
            fat_g: round2(self.fat_g),
        }
    }

    #[must_use]
    pub fn divided_by(&self, n: f64) -> Self {
        if n == 0.0 {
            return Self::default();
        }
        Self {
            kcal: self.kcal / n,
            protein_g: self.protein_g / n,
            carbs_g: self.carbs_g / n,
            fat_g: self.fat_g / n,
        }
    }

    #[must_use]
    pub fn minus(&self, other: &Self) -> Self {
        Self {
            kcal: self.kcal - other.kcal,
            protein_g: self.protein_g - other.protein_g,
            carbs_g: self.carbs_g - other.carbs_g,
            fat_g: self.fat_g - other.fat_g,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.kcal == 0.0 && self.protein_g == 0.0 && self.carbs_g == 0.0 && self.fat_g == 0.0
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Self) {
        self.kcal += rhs.kcal;
        self.protein_g += rhs.protein_g;
        self.carbs_g += rhs.carbs_g;
        self.fat_g += rhs.fat_g;
    }
}

impl std::iter::Sum for Macros {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, m| {
            acc += m;
            acc
        })
    }
}

// --- Users ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goals {
    pub calorie_goal: i64,
    pub protein_goal_g: i64,
    pub carbs_goal_g: i64,
    pub fat_goal_g: i64,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            calorie_goal: 2000,
            protein_goal_g: 150,
            carbs_goal_g: 200,
            fat_goal_g: 65,
        }
    }
}

impl Goals {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_macros(&self) -> Macros {
        Macros::new(
            self.calorie_goal as f64,
            self.protein_goal_g as f64,
            self.carbs_goal_g as f64,
            self.fat_goal_g as f64,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub goals: Goals,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub goals: Goals,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGoals {
    pub calorie_goal: Option<i64>,
    pub protein_goal_g: Option<i64>,
    pub carbs_goal_g: Option<i64>,
    pub fat_goal_g: Option<i64>,
}

impl UpdateGoals {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calorie_goal.is_none()
            && self.protein_goal_g.is_none()
            && self.carbs_goal_g.is_none()
            && self.fat_goal_g.is_none()
    }

    #[must_use]
    pub fn apply_to(&self, goals: Goals) -> Goals {
        Goals {
            calorie_goal: self.calorie_goal.unwrap_or(goals.calorie_goal),
            protein_goal_g: self.protein_goal_g.unwrap_or(goals.protein_goal_g),
            carbs_goal_g: self.carbs_goal_g.unwrap_or(goals.carbs_goal_g),
            fat_goal_g: self.fat_goal_g.unwrap_or(goals.fat_goal_g),
        }
    }
}

// --- Foods ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub kcal_per_100g: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiber_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sugar_g: Option<f64>,
    pub source: FoodSource,
    pub external_id: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Food {
    #[must_use]
    pub fn per_100g(&self) -> Macros {
        Macros::new(self.kcal_per_100g, self.protein_g, self.carbs_g, self.fat_g)
    }
}

/// A food that is not persisted yet: manual input, or a normalized candidate
/// returned by an external lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFood {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub kcal_per_100g: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fat_g: f64,
    /// Optional nutrients. Shown per food but not aggregated into totals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar_g: Option<f64>,
    #[serde(default = "default_source")]
    pub source: FoodSource,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_source() -> FoodSource {
    FoodSource::Manual
}

impl From<&Food> for NewFood {
    fn from(food: &Food) -> Self {
        Self {
            name: food.name.clone(),
            brand: food.brand.clone(),
            barcode: food.barcode.clone(),
            kcal_per_100g: food.kcal_per_100g,
            protein_g: food.protein_g,
            carbs_g: food.carbs_g,
            fat_g: food.fat_g,
            fiber_g: food.fiber_g,
            sugar_g: food.sugar_g,
            source: food.source,
            external_id: food.external_id.clone(),
            image_url: food.image_url.clone(),
        }
    }
}

/// Partial edit of a catalog food. An empty `brand` clears the brand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFood {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub kcal_per_100g: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
}

impl UpdateFood {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.brand.is_none()
            && self.kcal_per_100g.is_none()
            && self.protein_g.is_none()
            && self.carbs_g.is_none()
            && self.fat_g.is_none()
            && self.fiber_g.is_none()
            && self.sugar_g.is_none()
    }
}

/// One page of external search results. `count` is the total number of
/// matches reported by the provider, across all pages.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub products: Vec<NewFood>,
}

// --- Meal log ---

#[derive(Debug, Clone, Serialize)]
pub struct MealEntry {
    pub id: i64,
    pub user_id: i64,
    pub food_id: i64,
    pub date: NaiveDate,
    pub meal_slot: MealSlot,
    pub quantity_g: f64,
    pub food_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_brand: Option<String>,
    /// Food macros as they were when the entry was logged.
    pub per_100g: Macros,
    pub created_at: String,
}

impl MealEntry {
    /// Unrounded contribution of this entry.
    #[must_use]
    pub fn contribution(&self) -> Macros {
        self.per_100g.for_quantity(self.quantity_g)
    }
}

/// A meal entry together with its rounded contribution, as exposed by the API.
#[derive(Debug, Clone, Serialize)]
pub struct MealEntryView {
    #[serde(flatten)]
    pub entry: MealEntry,
    pub nutrients: Macros,
}

impl From<MealEntry> for MealEntryView {
    fn from(entry: MealEntry) -> Self {
        let nutrients = entry.contribution().rounded();
        Self { entry, nutrients }
    }
}

#[derive(Debug, Clone)]
pub struct NewMealEntry {
    pub user_id: i64,
    pub food_id: i64,
    pub date: NaiveDate,
    pub meal_slot: MealSlot,
    pub quantity_g: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMealEntry {
    pub quantity_g: Option<f64>,
    pub meal_slot: Option<MealSlot>,
    pub date: Option<NaiveDate>,
}

impl UpdateMealEntry {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantity_g.is_none() && self.meal_slot.is_none() && self.date.is_none()
    }
}

// --- Aggregates ---

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal_slot: MealSlot,
    pub entries: Vec<MealEntryView>,
    pub subtotal: Macros,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub user_id: i64,
    pub date: NaiveDate,
    pub meals: Vec<MealGroup>,
    pub totals: Macros,
    pub goals: Goals,
    pub remaining: Macros,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayTotals {
    pub date: NaiveDate,
    pub entry_count: usize,
    pub totals: Macros,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklySummary {
    pub user_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DayTotals>,
    pub totals: Macros,
    pub daily_average: Macros,
}

// --- Weight ---

#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub weight_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewWeightEntry {
    pub user_id: i64,
    pub date: NaiveDate,
    pub weight_kg: f64,
    pub note: Option<String>,
}

// --- Favorites ---

#[derive(Debug, Clone, Serialize)]
pub struct Favorite {
    pub user_id: i64,
    pub food_id: i64,
    pub created_at: String,
}

// --- Validation ---

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| Error::validation(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

pub fn validate_name(field: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Largest quantity accepted for a single meal entry, in grams.
pub const MAX_QUANTITY_G: f64 = 100_000.0;

/// Largest value accepted for any per-100 g nutrient.
pub const MAX_PER_100G: f64 = 10_000.0;

pub fn validate_quantity(quantity_g: f64) -> Result<()> {
    if !quantity_g.is_finite() || quantity_g <= 0.0 {
        return Err(Error::validation("quantity_g must be greater than 0"));
    }
    if quantity_g > MAX_QUANTITY_G {
        return Err(Error::validation(format!(
            "quantity_g must be at most {MAX_QUANTITY_G}"
        )));
    }
    Ok(())
}

pub fn validate_weight(weight_kg: f64) -> Result<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(Error::validation("weight_kg must be greater than 0"));
    }
    Ok(())
}

fn validate_macro(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(format!("{field} must not be negative")));
    }
    if value > MAX_PER_100G {
        return Err(Error::validation(format!(
            "{field} must be at most {MAX_PER_100G}"
        )));
    }
    Ok(())
}

pub fn validate_food(food: &NewFood) -> Result<()> {
    validate_name("name", &food.name)?;
    validate_macro("kcal_per_100g", food.kcal_per_100g)?;
    validate_macro("protein_g", food.protein_g)?;
    validate_macro("carbs_g", food.carbs_g)?;
    validate_macro("fat_g", food.fat_g)?;
    if let Some(fiber) = food.fiber_g {
        validate_macro("fiber_g", fiber)?;
    }
    if let Some(sugar) = food.sugar_g {
        validate_macro("sugar_g", sugar)?;
    }
    Ok(())
}

pub fn validate_food_update(update: &UpdateFood) -> Result<()> {
    if update.is_empty() {
        return Err(Error::validation("At least one field must be provided"));
    }
    if let Some(name) = &update.name {
        validate_name("name", name)?;
    }
    let macros = [
        ("kcal_per_100g", update.kcal_per_100g),
        ("protein_g", update.protein_g),
        ("carbs_g", update.carbs_g),
        ("fat_g", update.fat_g),
        ("fiber_g", update.fiber_g),
        ("sugar_g", update.sugar_g),
    ];
    for (field, value) in macros {
        if let Some(v) = value {
            validate_macro(field, v)?;
        }
    }
    Ok(())
}

pub fn validate_goals(goals: &Goals) -> Result<()> {
    let fields = [
        ("calorie_goal", goals.calorie_goal),
        ("protein_goal_g", goals.protein_goal_g),
        ("carbs_goal_g", goals.carbs_goal_g),
        ("fat_goal_g", goals.fat_goal_g),
    ];
    for (field, value) in fields {
        if value <= 0 {
            return Err(Error::validation(format!("{field} must be greater than 0")));
        }
    }
    Ok(())
}

/// Convert a quantity in `unit` to grams.
///
/// Volume units assume water density. Returns `(grams, is_approximate)`.
#[must_use]
pub fn convert_to_grams(quantity: f64, unit: &str) -> Option<(f64, bool)> {
    match unit.trim().to_lowercase().as_str() {
        "g" | "gram" | "grams" => Some((quantity, false)),
        "kg" | "kilogram" | "kilograms" => Some((quantity * 1000.0, false)),
        "oz" | "ounce" | "ounces" => Some((quantity * 28.35, false)),
        "lb" | "lbs" | "pound" | "pounds" => Some((quantity * 453.6, false)),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
            Some((quantity, true))
        }
        "l" | "liter" | "liters" | "litre" | "litres" => Some((quantity * 1000.0, true)),
        "tbsp" | "tablespoon" | "tablespoons" => Some((quantity * 15.0, true)),
        "tsp" | "teaspoon" | "teaspoons" => Some((quantity * 5.0, true)),
        _ => None,
    }
}
