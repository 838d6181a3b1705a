pub mod types;

pub use types::*;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::date_util::{end_of_day_exclusive, parse_date, start_of_day};
use crate::error::{Error, Result};
use crate::storage::Database;

/// Label for products with no (or an empty) category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Optional inclusive bounds on `created_at`, by calendar day (UTC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Parse optional `YYYY-MM-DD` bounds. Blank strings count as absent.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let parse = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_date)
                .transpose()
        };
        let range = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if let (Some(s), Some(e)) = (range.start, range.end) {
            if s > e {
                return Err(Error::InvalidQuery(format!(
                    "startDate {s} is after endDate {e}"
                )));
            }
        }
        Ok(range)
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn echo(&self) -> Option<DateRangeEcho> {
        if self.is_empty() {
            return None;
        }
        let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
        Some(DateRangeEcho {
            start_date: self.start.map(fmt),
            end_date: self.end.map(fmt),
        })
    }

    /// Extra `AND` conditions on `created_at` and their bound values.
    fn sql_conditions(&self) -> (String, Vec<String>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        if let Some(start) = self.start {
            params.push(start_of_day(start));
            sql.push_str(&format!(" AND created_at >= ?{}", params.len()));
        }
        if let Some(end) = self.end {
            params.push(end_of_day_exclusive(end));
            sql.push_str(&format!(" AND created_at < ?{}", params.len()));
        }
        (sql, params)
    }
}

/// `part / whole` as a percentage rounded to two decimals; 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

fn count(conn: &Connection, sql: &str, params: &[String]) -> std::result::Result<u64, rusqlite::Error> {
    let n: i64 = conn.query_row(sql, rusqlite::params_from_iter(params), |row| row.get(0))?;
    Ok(n as u64)
}

/// Deleted share over every stored product, soft-deleted rows included.
pub async fn compute_deleted_report(db: &Database) -> Result<DeletedProductsReport> {
    db.reader()
        .call(|conn| {
            let total_products = count(conn, "SELECT COUNT(*) FROM products", &[])?;
            let deleted_products = count(
                conn,
                "SELECT COUNT(*) FROM products WHERE deleted_at IS NOT NULL",
                &[],
            )?;
            Ok::<DeletedProductsReport, rusqlite::Error>(DeletedProductsReport {
                total_products,
                deleted_products,
                deleted_percentage: percentage(deleted_products, total_products),
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Price coverage over active products created within `range`.
pub async fn compute_non_deleted_report(
    db: &Database,
    range: DateRange,
) -> Result<NonDeletedProductsReport> {
    db.reader()
        .call(move |conn| {
            let (range_sql, params) = range.sql_conditions();
            let base = format!("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL{range_sql}");

            let total_non_deleted = count(conn, &base, &params)?;
            let with_price = count(conn, &format!("{base} AND price IS NOT NULL"), &params)?;
            let without_price = total_non_deleted - with_price;

            Ok::<NonDeletedProductsReport, rusqlite::Error>(NonDeletedProductsReport {
                total_non_deleted,
                with_price,
                without_price,
                with_price_percentage: percentage(with_price, total_non_deleted),
                without_price_percentage: percentage(without_price, total_non_deleted),
                date_range: range.echo(),
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Distribution of active products by category.
pub async fn compute_category_report(db: &Database) -> Result<ProductsByCategoryReport> {
    db.reader()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT COALESCE(NULLIF(category, ''), ?1) AS label, COUNT(*) AS n
                 FROM products
                 WHERE deleted_at IS NULL
                 GROUP BY label
                 ORDER BY n DESC, label ASC",
            )?;
            let groups = stmt
                .query_map([UNCATEGORIZED], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<std::result::Result<Vec<(String, u64)>, rusqlite::Error>>()?;

            let total_products: u64 = groups.iter().map(|(_, n)| n).sum();
            let distribution = groups
                .into_iter()
                .map(|(category, count)| CategoryShare {
                    category,
                    count,
                    percentage: percentage(count, total_products),
                })
                .collect();

            Ok::<ProductsByCategoryReport, rusqlite::Error>(ProductsByCategoryReport {
                total_products,
                distribution,
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contentful::CanonicalProduct;
    use crate::storage::repository::insert_products_ignoring_existing;

    fn item(id: &str, category: Option<&str>, price: Option<f64>) -> CanonicalProduct {
        CanonicalProduct {
            category: category.map(str::to_string),
            price,
            ..CanonicalProduct::new(id)
        }
    }

    /// Insert `(item, created_at)` pairs, then soft-delete the listed external ids.
    async fn seed(db: &Database, rows: Vec<(CanonicalProduct, &'static str)>, deleted: &'static [&'static str]) {
        db.writer()
            .call(move |conn| {
                for (product, created_at) in &rows {
                    insert_products_ignoring_existing(conn, std::slice::from_ref(product), created_at)?;
                }
                for id in deleted {
                    conn.execute(
                        "UPDATE products SET deleted_at = '2025-06-01T00:00:00.000Z' WHERE external_id = ?1",
                        [id],
                    )?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(5, 5), 100.0);
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse(Some("2025-01-01"), Some("2025-01-31")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2025, 1, 31));

        assert!(DateRange::parse(Some(""), None).unwrap().is_empty());
        assert!(DateRange::parse(Some("01/01/2025"), None).is_err());
        assert!(matches!(
            DateRange::parse(Some("2025-02-01"), Some("2025-01-01")),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_date_range_sql_conditions() {
        let (sql, params) = DateRange::parse(Some("2025-01-01"), Some("2025-01-31"))
            .unwrap()
            .sql_conditions();
        assert_eq!(sql, " AND created_at >= ?1 AND created_at < ?2");
        assert_eq!(params, vec!["2025-01-01T00:00:00.000Z", "2025-02-01T00:00:00.000Z"]);

        let (sql, params) = DateRange::parse(None, Some("2025-01-31")).unwrap().sql_conditions();
        assert_eq!(sql, " AND created_at < ?1");
        assert_eq!(params.len(), 1);
    }

    #[tokio::test]
    async fn test_reports_on_empty_store() {
        let db = Database::open_memory().await.unwrap();

        let deleted = compute_deleted_report(&db).await.unwrap();
        assert_eq!(deleted, DeletedProductsReport::default());

        let active = compute_non_deleted_report(&db, DateRange::default()).await.unwrap();
        assert_eq!(active.total_non_deleted, 0);
        assert_eq!(active.with_price_percentage, 0.0);
        assert!(active.date_range.is_none());

        let categories = compute_category_report(&db).await.unwrap();
        assert_eq!(categories.total_products, 0);
        assert!(categories.distribution.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_report() {
        let db = Database::open_memory().await.unwrap();
        seed(
            &db,
            vec![
                (item("a", Some("Phones"), Some(1.0)), "2025-01-01T00:00:00.000Z"),
                (item("b", Some("Phones"), None), "2025-01-01T00:00:00.000Z"),
                (item("c", None, Some(2.0)), "2025-01-01T00:00:00.000Z"),
            ],
            &["b"],
        )
        .await;

        let report = compute_deleted_report(&db).await.unwrap();
        assert_eq!(report.total_products, 3);
        assert_eq!(report.deleted_products, 1);
        assert_eq!(report.deleted_percentage, 33.33);
    }

    #[tokio::test]
    async fn test_non_deleted_report_with_date_range() {
        let db = Database::open_memory().await.unwrap();
        seed(
            &db,
            vec![
                (item("dec", None, Some(1.0)), "2024-12-31T23:59:59.999Z"),
                (item("jan1", None, Some(1.0)), "2025-01-01T00:00:00.000Z"),
                (item("jan15", None, None), "2025-01-15T12:00:00.000Z"),
                (item("jan31", None, None), "2025-01-31T23:00:00.000Z"),
                (item("feb", None, Some(3.0)), "2025-02-01T00:00:00.000Z"),
                (item("gone", None, Some(3.0)), "2025-01-10T00:00:00.000Z"),
            ],
            &["gone"],
        )
        .await;

        let all = compute_non_deleted_report(&db, DateRange::default()).await.unwrap();
        assert_eq!(all.total_non_deleted, 5);
        assert_eq!(all.with_price, 3);
        assert_eq!(all.without_price, 2);
        assert_eq!(all.with_price_percentage, 60.0);
        assert_eq!(all.without_price_percentage, 40.0);

        let range = DateRange::parse(Some("2025-01-01"), Some("2025-01-31")).unwrap();
        let january = compute_non_deleted_report(&db, range).await.unwrap();
        assert_eq!(january.total_non_deleted, 3);
        assert_eq!(january.with_price, 1);
        assert_eq!(january.with_price_percentage, 33.33);
        assert_eq!(january.without_price_percentage, 66.67);
        assert_eq!(
            january.date_range,
            Some(DateRangeEcho {
                start_date: Some("2025-01-01".into()),
                end_date: Some("2025-01-31".into()),
            })
        );

        let since = DateRange::parse(Some("2025-01-15"), None).unwrap();
        let report = compute_non_deleted_report(&db, since).await.unwrap();
        assert_eq!(report.total_non_deleted, 3);
        assert_eq!(report.date_range.unwrap().end_date, None);
    }

    #[tokio::test]
    async fn test_category_report() {
        let db = Database::open_memory().await.unwrap();
        seed(
            &db,
            vec![
                (item("a", Some("Phones"), None), "2025-01-01T00:00:00.000Z"),
                (item("b", Some("Phones"), None), "2025-01-01T00:00:00.000Z"),
                (item("c", Some("Laptops"), None), "2025-01-01T00:00:00.000Z"),
                (item("d", None, None), "2025-01-01T00:00:00.000Z"),
                (item("e", Some(""), None), "2025-01-01T00:00:00.000Z"),
                (item("f", Some("Tablets"), None), "2025-01-01T00:00:00.000Z"),
                (item("g", Some("Laptops"), None), "2025-01-01T00:00:00.000Z"),
                (item("h", Some("Phones"), None), "2025-01-01T00:00:00.000Z"),
            ],
            &["g"],
        )
        .await;

        let report = compute_category_report(&db).await.unwrap();
        assert_eq!(report.total_products, 7);
        let rows: Vec<(&str, u64, f64)> = report
            .distribution
            .iter()
            .map(|s| (s.category.as_str(), s.count, s.percentage))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Phones", 3, 42.86),
                (UNCATEGORIZED, 2, 28.57),
                ("Laptops", 1, 14.29),
                ("Tablets", 1, 14.29),
            ]
        );
    }
}
