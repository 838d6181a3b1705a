use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::repository::{product_from_row, Product, PRODUCT_COLUMNS};
use crate::storage::Database;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 5;
pub const MAX_LIMIT: u32 = 5;

/// One page of results plus navigation totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Paginated<T> {
    fn new(data: Vec<T>, page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit));
        Self {
            data,
            page,
            limit,
            total,
            total_pages,
            has_previous: page > 1,
            has_next: u64::from(page) < total_pages,
        }
    }
}

/// Builder for paged, filtered reads of active products.
///
/// Text filters are case-insensitive substring matches; price bounds are
/// inclusive. Results are newest first.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    page: u32,
    limit: u32,
    name: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    color: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            name: None,
            category: None,
            brand: None,
            color: None,
            min_price: None,
            max_price: None,
        }
    }
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn min_price(mut self, price: f64) -> Self {
        self.min_price = Some(price);
        self
    }

    pub fn max_price(mut self, price: f64) -> Self {
        self.max_price = Some(price);
        self
    }

    /// Check bounds: page >= 1, 1 <= limit <= 5, prices >= 0.
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(Error::InvalidQuery("page must be at least 1".into()));
        }
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidQuery(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        for (label, price) in [("minPrice", self.min_price), ("maxPrice", self.max_price)] {
            if let Some(p) = price {
                if !p.is_finite() || p < 0.0 {
                    return Err(Error::InvalidQuery(format!("{label} must not be negative")));
                }
            }
        }
        Ok(())
    }

    /// Validate, then execute the query.
    pub async fn fetch(self, db: &Database) -> Result<Paginated<Product>> {
        self.validate()?;
        let (page, limit) = (self.page, self.limit);
        let (rows, total) = db
            .reader()
            .call(move |conn| {
                let (where_sql, params) = self.build_where();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();

                let count_sql = format!("SELECT COUNT(*) FROM products p {where_sql}");
                let total: i64 = conn.query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))?;

                let offset = u64::from(page - 1) * u64::from(limit);
                let select_sql = format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products p {where_sql} \
                     ORDER BY p.created_at DESC, p.rowid DESC LIMIT {} OFFSET {offset}",
                    limit
                );
                let mut stmt = conn.prepare(&select_sql)?;
                let rows = stmt
                    .query_map(param_refs.as_slice(), product_from_row)?
                    .collect::<std::result::Result<Vec<Product>, rusqlite::Error>>()?;
                Ok::<(Vec<Product>, u64), rusqlite::Error>((rows, total as u64))
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Paginated::new(rows, page, limit, total))
    }

    fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = vec!["p.deleted_at IS NULL".to_string()];
        let mut param_idx = 1;

        for (column, value) in [
            ("p.name", &self.name),
            ("p.category", &self.category),
            ("p.brand", &self.brand),
            ("p.color", &self.color),
        ] {
            if let Some(v) = value {
                wheres.push(format!("{column} LIKE ?{param_idx} ESCAPE '\\'"));
                params.push(Box::new(like_pattern(v)));
                param_idx += 1;
            }
        }

        if let Some(min) = self.min_price {
            wheres.push(format!("p.price >= ?{param_idx}"));
            params.push(Box::new(min));
            param_idx += 1;
        }
        if let Some(max) = self.max_price {
            wheres.push(format!("p.price <= ?{param_idx}"));
            params.push(Box::new(max));
        }

        (format!("WHERE {}", wheres.join(" AND ")), params)
    }
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
