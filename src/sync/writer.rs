use crate::contentful::CanonicalProduct;
use crate::date_util::now_timestamp;
use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::UpsertCounts;

/// Records per multi-row insert statement.
pub const BATCH_SIZE: usize = 500;

/// Insert every record whose `external_id` is not yet stored.
///
/// All batches run inside one transaction: if any batch fails, nothing from
/// this call is committed. Existing rows are never updated.
pub async fn upsert_many(db: &Database, records: Vec<CanonicalProduct>) -> Result<UpsertCounts> {
    if records.is_empty() {
        return Ok(UpsertCounts::default());
    }

    let total_batches = records.len().div_ceil(BATCH_SIZE);
    log::info!(
        "Starting insert of {} products in {total_batches} batches",
        records.len()
    );

    let counts = db
        .writer()
        .call(move |conn| {
            let now = now_timestamp();
            let tx = conn.transaction()?;
            let mut counts = UpsertCounts::default();

            for (i, batch) in records.chunks(BATCH_SIZE).enumerate() {
                log::debug!(
                    "Processing batch {}/{total_batches} ({} items)",
                    i + 1,
                    batch.len()
                );
                let written = repository::insert_products_ignoring_existing(&tx, batch, &now)?;
                counts.inserted += written;
                counts.skipped += batch.len() - written;
            }

            tx.commit()?;
            Ok::<UpsertCounts, rusqlite::Error>(counts)
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    log::info!(
        "Insert complete. Inserted: {}, Skipped (already exist): {}",
        counts.inserted,
        counts.skipped
    );
    Ok(counts)
}
