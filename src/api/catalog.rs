//! Product catalog endpoints

use super::transport::ApiRequest;
use super::{ApiClient, ApiError};
use crate::models::{Category, Listing, Product, ProductFilter};

impl ApiClient {
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        let listing: Listing<Product> = self
            .send_json(ApiRequest::get("/api/products/").query(filter.to_query()))
            .await?;
        Ok(listing.into_items())
    }

    pub async fn product(&self, id: u64) -> Result<Product, ApiError> {
        self.send_json(ApiRequest::get(format!("/api/products/{}/", id)))
            .await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let listing: Listing<Category> =
            self.send_json(ApiRequest::get("/api/categories/")).await?;
        Ok(listing.into_items())
    }
}
