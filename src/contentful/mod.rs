pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub use client::ContentfulClient;

/// Page size used when none is configured; also the Contentful API default.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Storage-ready shape of one remote catalog entry.
///
/// `external_id` is the Contentful `sys.id`. Every other field is copied
/// through from the entry's field bag as-is; absent stays absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub external_id: String,
    pub sku: Option<i64>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub stock: Option<i64>,
}

impl CanonicalProduct {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            ..Self::default()
        }
    }
}

/// One page of the entries collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPage {
    #[serde(default)]
    pub items: Vec<Entry>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub sys: EntrySys,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntrySys {
    pub id: String,
}

impl Entry {
    pub fn to_canonical(&self) -> CanonicalProduct {
        CanonicalProduct {
            external_id: self.sys.id.clone(),
            sku: self.int_field("sku"),
            name: self.text_field("name"),
            brand: self.text_field("brand"),
            model: self.text_field("model"),
            category: self.text_field("category"),
            color: self.text_field("color"),
            price: self.number_field("price"),
            currency: self.text_field("currency"),
            stock: self.int_field("stock"),
        }
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    fn text_field(&self, key: &str) -> Option<String> {
        let value = self.field(key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.log_mistyped(key, value);
                None
            }
        }
    }

    /// Integers, whole-number floats (`3.0`) and numeric strings (`"1001"`).
    fn int_field(&self, key: &str) -> Option<i64> {
        let value = self.field(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_number)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
            }
            _ => None,
        };
        if parsed.is_none() {
            self.log_mistyped(key, value);
        }
        parsed
    }

    /// Numbers and numeric strings (`"12.50"`).
    fn number_field(&self, key: &str) -> Option<f64> {
        let value = self.field(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        };
        if parsed.is_none() {
            self.log_mistyped(key, value);
        }
        parsed
    }

    fn log_mistyped(&self, key: &str, value: &Value) {
        log::debug!("Entry {}: ignoring field '{key}' with unexpected value {value}", self.sys.id);
    }
}

fn whole_number(f: f64) -> Option<i64> {
    let in_range = f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64;
    in_range.then_some(f as i64)
}

/// A paginated source of catalog entries.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch `limit` entries starting at offset `skip`, newest update first.
    async fn fetch_page(&self, skip: u32, limit: u32) -> Result<EntryPage>;
}

/// Page through `source` from offset 0 and return every entry, normalized.
///
/// Stops on an empty page or on a page shorter than `page_size`. Errors from
/// any page are returned as-is; entries from earlier pages are discarded.
pub async fn fetch_all(source: &dyn CatalogSource, page_size: u32) -> Result<Vec<CanonicalProduct>> {
    if page_size == 0 {
        return Err(Error::Config("page size must be positive".into()));
    }

    let mut all_items: Vec<CanonicalProduct> = Vec::new();
    let mut skip: u32 = 0;

    loop {
        log::debug!("Fetching page: skip={skip}, limit={page_size}");
        let page = source.fetch_page(skip, page_size).await?;

        let page_number = skip / page_size + 1;
        let total_pages = page
            .total
            .map_or_else(|| "?".to_string(), |t| t.div_ceil(u64::from(page_size)).to_string());
        log::info!(
            "Page {page_number}/{total_pages}: received {} items (total in Contentful: {}, cumulative: {})",
            page.items.len(),
            page.total.map_or_else(|| "?".to_string(), |t| t.to_string()),
            all_items.len() + page.items.len(),
        );

        if page.items.is_empty() {
            log::info!("No more items to fetch, pagination complete");
            break;
        }

        let received = page.items.len();
        all_items.extend(page.items.iter().map(Entry::to_canonical));

        if received < page_size as usize {
            break;
        }
        skip += page_size;
    }

    log::info!("Fetched {} products from Contentful", all_items.len());
    Ok(all_items)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    pub(crate) fn entry(id: &str, fields: Value) -> Entry {
        serde_json::from_value(json!({ "sys": { "id": id }, "fields": fields })).unwrap()
    }

    /// Serves pre-built pages in order and records every request.
    pub(crate) struct PagedSource {
        pages: Mutex<Vec<EntryPage>>,
        pub(crate) requests: Mutex<Vec<(u32, u32)>>,
    }

    impl PagedSource {
        pub(crate) fn with_page_sizes(sizes: &[usize]) -> Self {
            let total: usize = sizes.iter().sum();
            let mut next_id = 0;
            let pages = sizes
                .iter()
                .map(|&n| {
                    let items = (0..n)
                        .map(|_| {
                            next_id += 1;
                            entry(&format!("p{next_id}"), json!({ "name": format!("Product {next_id}") }))
                        })
                        .collect();
                    EntryPage {
                        items,
                        total: Some(total as u64),
                    }
                })
                .collect();
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for PagedSource {
        async fn fetch_page(&self, skip: u32, limit: u32) -> Result<EntryPage> {
            self.requests.lock().unwrap().push((skip, limit));
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(EntryPage::default())
            } else {
                Ok(pages.remove(0))
            }
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CatalogSource for FailingSource {
        async fn fetch_page(&self, skip: u32, _limit: u32) -> Result<EntryPage> {
            if skip == 0 {
                Ok(EntryPage {
                    items: vec![entry("a", json!({})), entry("b", json!({}))],
                    total: None,
                })
            } else {
                Err(Error::Remote {
                    status: 503,
                    message: "unavailable".into(),
                })
            }
        }
    }

    #[test]
    fn test_to_canonical_copies_fields() {
        let e = entry(
            "abc123",
            json!({
                "sku": 1001,
                "name": "Phone X",
                "brand": "Acme",
                "model": "X1",
                "category": "Smartphone",
                "color": "Black",
                "price": 199.99,
                "currency": "USD",
                "stock": 12
            }),
        );
        let p = e.to_canonical();
        assert_eq!(p.external_id, "abc123");
        assert_eq!(p.sku, Some(1001));
        assert_eq!(p.name.as_deref(), Some("Phone X"));
        assert_eq!(p.brand.as_deref(), Some("Acme"));
        assert_eq!(p.model.as_deref(), Some("X1"));
        assert_eq!(p.category.as_deref(), Some("Smartphone"));
        assert_eq!(p.color.as_deref(), Some("Black"));
        assert_eq!(p.price, Some(199.99));
        assert_eq!(p.currency.as_deref(), Some("USD"));
        assert_eq!(p.stock, Some(12));
    }

    #[test]
    fn test_to_canonical_absent_and_mistyped_fields() {
        let e = entry(
            "x",
            json!({ "name": "Only name", "price": "about 12", "stock": null, "sku": 10.5, "brand": 7 }),
        );
        let p = e.to_canonical();
        assert_eq!(p.name.as_deref(), Some("Only name"));
        assert_eq!(p.price, None);
        assert_eq!(p.stock, None);
        assert_eq!(p.brand, None);
        assert_eq!(p.sku, None);
    }

    #[test]
    fn test_to_canonical_reads_numeric_strings_and_whole_floats() {
        let p = entry("x", json!({ "price": "12.50", "sku": "1001", "stock": 3.0 })).to_canonical();
        assert_eq!(p.price, Some(12.5));
        assert_eq!(p.sku, Some(1001));
        assert_eq!(p.stock, Some(3));

        let p = entry("y", json!({ "price": " 7 ", "sku": "42.0", "stock": "-2" })).to_canonical();
        assert_eq!(p.price, Some(7.0));
        assert_eq!(p.sku, Some(42));
        assert_eq!(p.stock, Some(-2));
    }

    #[test]
    fn test_to_canonical_rejects_non_finite_strings() {
        let p = entry("z", json!({ "price": "NaN", "stock": "inf" })).to_canonical();
        assert_eq!(p.price, None);
        assert_eq!(p.stock, None);
    }

    #[test]
    fn test_entry_without_fields() {
        let e: Entry = serde_json::from_value(json!({ "sys": { "id": "bare" } })).unwrap();
        assert_eq!(e.to_canonical(), CanonicalProduct::new("bare"));
    }

    #[test]
    fn test_entry_without_sys_id_is_rejected() {
        let parsed: std::result::Result<EntryPage, _> =
            serde_json::from_value(json!({ "items": [{ "sys": {}, "fields": {} }], "total": 1 }));
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_short_page() {
        let source = PagedSource::with_page_sizes(&[100, 100, 37]);

        let items = fetch_all(&source, 100).await.unwrap();

        assert_eq!(items.len(), 237);
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec![(0, 100), (100, 100), (200, 100)]
        );
        assert_eq!(items[0].external_id, "p1");
        assert_eq!(items[100].external_id, "p101");
        assert_eq!(items[236].external_id, "p237");
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_empty_page() {
        let source = PagedSource::with_page_sizes(&[50, 50]);

        let items = fetch_all(&source, 50).await.unwrap();

        assert_eq!(items.len(), 100);
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec![(0, 50), (50, 50), (100, 50)]
        );
    }

    #[tokio::test]
    async fn test_fetch_all_empty_remote() {
        let source = PagedSource::with_page_sizes(&[]);
        let items = fetch_all(&source, DEFAULT_PAGE_SIZE).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(source.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_propagates_page_error() {
        let err = fetch_all(&FailingSource, 2).await.unwrap_err();
        assert!(matches!(err, Error::Remote { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_all_rejects_zero_page_size() {
        let source = PagedSource::with_page_sizes(&[1]);
        assert!(matches!(fetch_all(&source, 0).await, Err(Error::Config(_))));
        assert!(source.requests.lock().unwrap().is_empty());
    }
}
