use std::fmt::Display;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;

use caltrack_core::Error;
use caltrack_core::models::{NewFood, SearchPage};
use caltrack_core::openfoodfacts::{
    ProductResponse, SearchResponse, product_to_candidate, search_to_page,
};
use caltrack_core::service::{FoodLookup, SEARCH_PAGE_SIZE};

const FIELDS: &str = "code,product_name,brands,image_front_small_url,nutriments";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    base_url: String,
}

fn unavailable(err: impl Display) -> Error {
    tracing::warn!(error = %err, "food lookup failed");
    Error::LookupUnavailable(format!("{err}. Please retry later"))
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "caltrack/{} (household nutrition tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn search_async(&self, query: &str, page: u32) -> caltrack_core::Result<SearchPage> {
        let url = format!("{}/api/v2/search", self.base_url);
        tracing::debug!(%query, page, "searching Open Food Facts");
        let resp = self
            .client
            .get(&url)
            .query(&[("search_terms", query), ("fields", FIELDS)])
            .query(&[("page", page), ("page_size", SEARCH_PAGE_SIZE)])
            .send()
            .await
            .map_err(unavailable)?;

        if !resp.status().is_success() {
            return Err(unavailable(format!(
                "Open Food Facts search returned {}",
                resp.status()
            )));
        }

        let data: SearchResponse = resp.json().await.map_err(unavailable)?;
        Ok(search_to_page(data, page, SEARCH_PAGE_SIZE))
    }

    pub async fn lookup_barcode_async(&self, code: &str) -> caltrack_core::Result<NewFood> {
        let url = format!("{}/api/v2/product/{code}", self.base_url);
        tracing::debug!(%code, "looking up barcode on Open Food Facts");
        let resp = self
            .client
            .get(&url)
            .query(&[("fields", FIELDS)])
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("No product found for barcode '{code}'")));
        }
        if !status.is_success() {
            return Err(unavailable(format!(
                "Open Food Facts product lookup returned {status}"
            )));
        }

        let data: ProductResponse = resp.json().await.map_err(unavailable)?;
        if data.status != 1 {
            return Err(Error::not_found(format!("No product found for barcode '{code}'")));
        }

        data.product.and_then(product_to_candidate).ok_or_else(|| {
            Error::not_found(format!(
                "Product '{code}' has no usable name or energy value"
            ))
        })
    }
}

#[async_trait]
impl FoodLookup for OpenFoodFactsClient {
    async fn search(&self, query: &str, page: u32) -> caltrack_core::Result<SearchPage> {
        self.search_async(query, page).await
    }

    async fn lookup_barcode(&self, code: &str) -> caltrack_core::Result<NewFood> {
        self.lookup_barcode_async(code).await
    }
}
