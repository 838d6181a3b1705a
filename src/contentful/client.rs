use std::fmt;

use async_trait::async_trait;
use url::Url;

use super::{CatalogSource, EntryPage};
use crate::config::ContentfulConfig;
use crate::error::{Error, Result};

/// Contentful Content Delivery API client for one space/environment/content type.
#[derive(Clone)]
pub struct ContentfulClient {
    http: reqwest::Client,
    entries_url: Url,
    access_token: String,
    content_type: String,
}

impl ContentfulClient {
    /// Build a client from configuration. Space id and access token are required.
    pub fn new(config: &ContentfulConfig) -> Result<Self> {
        let (Some(space_id), Some(access_token)) = (&config.space_id, &config.access_token) else {
            return Err(Error::Config(
                "Contentful credentials (CONTENTFUL_SPACE_ID and CONTENTFUL_ACCESS_TOKEN) are required"
                    .into(),
            ));
        };

        let entries_url = Url::parse(&format!(
            "{}/spaces/{space_id}/environments/{}/entries",
            config.base_url.trim_end_matches('/'),
            config.environment,
        ))
        .map_err(|e| Error::Config(format!("invalid Contentful base URL '{}': {e}", config.base_url)))?;

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            entries_url,
            access_token: access_token.clone(),
            content_type: config.content_type.clone(),
        })
    }

    fn page_url(&self, skip: u32, limit: u32) -> Url {
        let mut url = self.entries_url.clone();
        url.query_pairs_mut()
            .append_pair("content_type", &self.content_type)
            .append_pair("limit", &limit.to_string())
            .append_pair("skip", &skip.to_string())
            .append_pair("order", "-sys.updatedAt");
        url
    }
}

#[async_trait]
impl CatalogSource for ContentfulClient {
    async fn fetch_page(&self, skip: u32, limit: u32) -> Result<EntryPage> {
        let response = self
            .http
            .get(self.page_url(skip, limit))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<EntryPage>().await?)
    }
}

impl fmt::Debug for ContentfulClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ContentfulClient")
            .field("entries_url", &self.entries_url.as_str())
            .field("access_token", &"[REDACTED]")
            .field("content_type", &self.content_type)
            .finish()
    }
}
