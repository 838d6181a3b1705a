pub mod auth;
pub mod config;
pub mod contentful;
pub mod date_util;
pub mod error;
pub mod http;
pub mod query;
pub mod reports;
pub mod storage;
pub mod sync;

use std::sync::Arc;

pub use config::Config;
pub use contentful::{CanonicalProduct, CatalogSource, ContentfulClient};
pub use error::{Error, Result};
pub use query::{Paginated, ProductQuery};
pub use reports::{
    DateRange, DeletedProductsReport, NonDeletedProductsReport, ProductsByCategoryReport,
};
pub use storage::repository::Product;
pub use storage::Database;
pub use sync::scheduler::SyncScheduler;
pub use sync::{SyncRun, SyncStatus};

use date_util::now_timestamp;
use storage::repository;

/// Read and soft-delete access to the mirrored product catalog.
#[derive(Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Build a scheduler that syncs `source` into this catalog's database.
    pub fn scheduler(&self, source: Arc<dyn CatalogSource>, page_size: u32) -> SyncScheduler {
        SyncScheduler::new(self.db.clone(), source, page_size)
    }

    // ── Products ────────────────────────────────────────────────

    pub async fn products(&self, query: ProductQuery) -> Result<Paginated<Product>> {
        query.fetch(&self.db).await
    }

    /// Fetch one active product by its local id.
    pub async fn product(&self, id: &str) -> Result<Product> {
        let id = id.to_string();
        let lookup = id.clone();
        self.db
            .reader()
            .call(move |conn| repository::get_active_product(conn, &lookup))
            .await?
            .ok_or_else(|| Error::NotFound(format!("product {id}")))
    }

    /// Mark an active product deleted. Missing or already-deleted ids are `NotFound`.
    pub async fn delete_product(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let target = id.clone();
        let deleted = self
            .db
            .writer()
            .call(move |conn| repository::soft_delete_product(conn, &target, &now_timestamp()))
            .await?;

        if !deleted {
            return Err(Error::NotFound(format!("product {id}")));
        }
        log::info!("Soft-deleted product {id}");
        Ok(())
    }

    // ── Reports ─────────────────────────────────────────────────

    pub async fn deleted_report(&self) -> Result<DeletedProductsReport> {
        reports::compute_deleted_report(&self.db).await
    }

    pub async fn non_deleted_report(&self, range: DateRange) -> Result<NonDeletedProductsReport> {
        reports::compute_non_deleted_report(&self.db, range).await
    }

    pub async fn category_report(&self) -> Result<ProductsByCategoryReport> {
        reports::compute_category_report(&self.db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::writer::{tests::records, upsert_many};

    async fn seeded_catalog(n: usize) -> (Catalog, Vec<String>) {
        let db = Database::open_memory().await.unwrap();
        upsert_many(&db, records(n, "e")).await.unwrap();
        let ids = db
            .reader()
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM products ORDER BY external_id")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<std::result::Result<Vec<String>, rusqlite::Error>>()
            })
            .await
            .unwrap();
        (Catalog::new(db), ids)
    }

    #[tokio::test]
    async fn test_product_lookup() {
        let (catalog, ids) = seeded_catalog(2).await;
        let product = catalog.product(&ids[0]).await.unwrap();
        assert_eq!(product.id, ids[0]);
        assert_eq!(product.external_id, "e0");

        assert!(matches!(
            catalog.product("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_product_hides_it() {
        let (catalog, ids) = seeded_catalog(3).await;

        catalog.delete_product(&ids[1]).await.unwrap();
        assert!(matches!(
            catalog.product(&ids[1]).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete_product(&ids[1]).await,
            Err(Error::NotFound(_))
        ));

        let page = catalog.products(ProductQuery::new()).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.data.iter().all(|p| p.id != ids[1]));

        let report = catalog.deleted_report().await.unwrap();
        assert_eq!((report.total_products, report.deleted_products), (3, 1));
    }

    #[tokio::test]
    async fn test_deleted_products_survive_resync() {
        let (catalog, ids) = seeded_catalog(2).await;
        catalog.delete_product(&ids[0]).await.unwrap();

        let counts = upsert_many(catalog.db(), records(2, "e")).await.unwrap();
        assert_eq!(counts.inserted, 0);
        assert!(catalog.product(&ids[0]).await.is_err());
    }
}
