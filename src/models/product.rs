//! Catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

/// Product as embedded in cart lines and catalog listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<u64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub is_in_stock: bool,
}

/// Query filters for the product listing
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<u64>,
}

impl ProductFilter {
    /// Query pairs for the set filters.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(ref search) = self.search {
            if !search.is_empty() {
                query.push(("search".to_string(), search.clone()));
            }
        }
        if let Some(category) = self.category {
            query.push(("category".to_string(), category.to_string()));
        }
        query
    }
}

/// Listing endpoints may answer with a bare array or a paginated page.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Plain(items) => items,
        }
    }
}
