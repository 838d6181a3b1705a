use serde::Serialize;

/// Share of all products (soft-deleted included) that are soft-deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedProductsReport {
    pub total_products: u64,
    pub deleted_products: u64,
    pub deleted_percentage: f64,
}

/// Price coverage of active products, optionally limited to a creation-date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonDeletedProductsReport {
    pub total_non_deleted: u64,
    pub with_price: u64,
    pub without_price: u64,
    pub with_price_percentage: f64,
    pub without_price_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRangeEcho>,
}

/// The date bounds a report was computed over, as `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeEcho {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub category: String,
    pub count: u64,
    pub percentage: f64,
}

/// Active products grouped by category, largest group first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsByCategoryReport {
    pub total_products: u64,
    pub distribution: Vec<CategoryShare>,
}
