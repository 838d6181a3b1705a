use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::contentful::CanonicalProduct;

/// Columns written per product by [`insert_products_ignoring_existing`].
const INSERT_COLUMNS: usize = 13;

// ── Products ───────────────────────────────────────────────────────

/// A persisted product row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub external_id: String,
    pub name: Option<String>,
    pub sku: Option<i64>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub stock: Option<i64>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const PRODUCT_COLUMNS: &str = "id, external_id, name, sku, brand, model, category, color, \
     price, currency, stock, deleted_at, created_at, updated_at";

pub(crate) fn product_from_row(row: &Row<'_>) -> Result<Product, rusqlite::Error> {
    Ok(Product {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        sku: row.get(3)?,
        brand: row.get(4)?,
        model: row.get(5)?,
        category: row.get(6)?,
        color: row.get(7)?,
        price: row.get(8)?,
        currency: row.get(9)?,
        stock: row.get(10)?,
        deleted_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Insert a batch of products with one multi-row `INSERT OR IGNORE`.
///
/// Rows whose `external_id` already exists (soft-deleted rows included, and
/// earlier rows of the same batch) are dropped. Returns the number of rows
/// actually written.
pub fn insert_products_ignoring_existing(
    conn: &Connection,
    batch: &[CanonicalProduct],
    now: &str,
) -> Result<usize, rusqlite::Error> {
    if batch.is_empty() {
        return Ok(0);
    }

    let placeholders = (0..batch.len())
        .map(|i| {
            let base = i * INSERT_COLUMNS;
            let slots: Vec<String> = (1..=INSERT_COLUMNS).map(|c| format!("?{}", base + c)).collect();
            format!("({})", slots.join(", "))
        })
        .collect::<Vec<_>>()
        .join(",\n");

    let sql = format!(
        "INSERT OR IGNORE INTO products (
            id, external_id, name, sku, brand, model, category, color,
            price, currency, stock, created_at, updated_at
        ) VALUES {placeholders}"
    );

    let mut values: Vec<Value> = Vec::with_capacity(batch.len() * INSERT_COLUMNS);
    for item in batch {
        values.push(Value::Text(uuid::Uuid::new_v4().to_string()));
        values.push(Value::Text(item.external_id.clone()));
        values.push(opt_text(&item.name));
        values.push(item.sku.map_or(Value::Null, Value::Integer));
        values.push(opt_text(&item.brand));
        values.push(opt_text(&item.model));
        values.push(opt_text(&item.category));
        values.push(opt_text(&item.color));
        values.push(item.price.map_or(Value::Null, Value::Real));
        values.push(opt_text(&item.currency));
        values.push(item.stock.map_or(Value::Null, Value::Integer));
        values.push(Value::Text(now.to_string()));
        values.push(Value::Text(now.to_string()));
    }

    conn.execute(&sql, params_from_iter(values))
}

fn opt_text(v: &Option<String>) -> Value {
    v.as_ref().map_or(Value::Null, |s| Value::Text(s.clone()))
}

/// Fetch an active (not soft-deleted) product by id.
pub fn get_active_product(conn: &Connection, id: &str) -> Result<Option<Product>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND deleted_at IS NULL"),
        params![id],
        product_from_row,
    )
    .optional()
}

/// Fetch a product by external id, soft-deleted or not.
pub fn get_product_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> Result<Option<Product>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE external_id = ?1"),
        params![external_id],
        product_from_row,
    )
    .optional()
}

/// Mark an active product as deleted. Returns false if no active row matched.
pub fn soft_delete_product(conn: &Connection, id: &str, now: &str) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "UPDATE products SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        params![id, now],
    )?;
    Ok(count > 0)
}

/// Count products; `include_deleted` opts in to soft-deleted rows.
pub fn count_products(conn: &Connection, include_deleted: bool) -> Result<u64, rusqlite::Error> {
    let sql = if include_deleted {
        "SELECT COUNT(*) FROM products"
    } else {
        "SELECT COUNT(*) FROM products WHERE deleted_at IS NULL"
    };
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count as u64)
}
