use serde::Deserialize;

use crate::models::{FoodSource, NewFood, SearchPage};

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub products: Vec<ProductData>,
}

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    #[serde(default)]
    pub status: i32,
    pub product: Option<ProductData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub brands: Option<String>,
    pub code: Option<String>,
    pub image_front_small_url: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub fiber_100g: Option<f64>,
    pub sugars_100g: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn non_negative(value: Option<f64>) -> f64 {
    usable(value).unwrap_or(0.0)
}

/// Normalize an Open Food Facts product into a food candidate.
///
/// Products without a name, or without an energy value, are dropped. Missing
/// macros become 0; missing fiber and sugar stay unknown. The product code doubles as barcode and `external_id`.
#[must_use]
pub fn product_to_candidate(p: ProductData) -> Option<NewFood> {
    let name = non_empty(p.product_name)?;
    let nutriments = p.nutriments?;
    let kcal = usable(nutriments.energy_kcal_100g)?;
    let code = non_empty(p.code);

    Some(NewFood {
        name,
        brand: non_empty(p.brands),
        barcode: code.clone(),
        kcal_per_100g: kcal,
        protein_g: non_negative(nutriments.proteins_100g),
        carbs_g: non_negative(nutriments.carbohydrates_100g),
        fat_g: non_negative(nutriments.fat_100g),
        fiber_g: usable(nutriments.fiber_100g),
        sugar_g: usable(nutriments.sugars_100g),
        source: FoodSource::External,
        external_id: code,
        image_url: non_empty(p.image_front_small_url),
    })
}

/// Normalize one page of search results, dropping unusable products.
///
/// `count` is the upstream total across all pages, so it can exceed the
/// number of products kept here.
#[must_use]
pub fn search_to_page(resp: SearchResponse, page: u32, page_size: u32) -> SearchPage {
    SearchPage {
        count: resp.count,
        page,
        page_size,
        products: resp
            .products
            .into_iter()
            .filter_map(product_to_candidate)
            .collect(),
    }
}
