//! Blocking STAC Item Search client.

use crate::models::{Item, ItemCollection, Link, SearchParams};
use crate::{Result, StacError};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Digital Earth Pacific STAC catalog.
pub const DEFAULT_CATALOG: &str = "https://stac.digitalearthpacific.org";

/// Annual Sentinel-2 GeoMAD composites.
pub const GEOMAD_COLLECTION: &str = "dep_s2_geomad";

/// Stop following `next` links after this many pages.
const MAX_PAGES: usize = 100;

/// Bytes of an error body kept in [`StacError::HttpStatus`].
const ERROR_BODY_CHARS: usize = 500;

/// Client for one STAC API.
pub struct StacClient {
    catalog: String,
    client: reqwest::blocking::Client,
}

impl StacClient {
    /// Client for a catalog root URL.
    pub fn new(catalog: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            catalog: catalog.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// The `POST /search` URL.
    pub fn search_url(&self) -> String {
        if self.catalog.ends_with("/search") {
            self.catalog.clone()
        } else {
            format!("{}/search", self.catalog)
        }
    }

    /// One page of results.
    pub fn search(&self, params: &SearchParams) -> Result<ItemCollection> {
        self.post(&self.search_url(), params)
    }

    /// All items, following `next` links.
    pub fn search_all(&self, params: &SearchParams) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut page = self.search(params)?;
        let mut pages = 1;

        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);

            match next {
                Some(link) if pages < MAX_PAGES => {
                    page = self.follow_next(&link, params)?;
                    pages += 1;
                    if page.is_empty() {
                        break;
                    }
                }
                _ => break,
            }
        }

        debug!(items = items.len(), pages, "Search complete");
        Ok(items)
    }

    /// All items matching `params`; no items is an error.
    pub fn find_items(&self, params: &SearchParams) -> Result<Vec<Item>> {
        let items = self.search_all(params)?;
        if items.is_empty() {
            return Err(StacError::EmptyCollection {
                collections: params.collections.clone().unwrap_or_default(),
                datetime: params.datetime.clone().unwrap_or_default(),
            });
        }
        info!(count = items.len(), "Found items");
        Ok(items)
    }

    fn post(&self, url: &str, params: &SearchParams) -> Result<ItemCollection> {
        debug!(url, "POST search");
        let response = self.client.post(url).json(params).send()?;
        parse_response(url, response)
    }

    fn follow_next(&self, link: &Link, params: &SearchParams) -> Result<ItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();
        if method != "POST" {
            debug!(url = %link.href, "GET next page");
            let response = self.client.get(&link.href).send()?;
            return parse_response(&link.href, response);
        }

        let body = next_body(link, params)?;
        let params: SearchParams = serde_json::from_value(body)?;
        self.post(&link.href, &params)
    }
}

/// Request body for a POST `next` link.
fn next_body(link: &Link, params: &SearchParams) -> Result<Value> {
    match (&link.body, link.merge.unwrap_or(false)) {
        (Some(body), true) => {
            let mut base = serde_json::to_value(params)?;
            if let (Some(base), Some(body)) = (base.as_object_mut(), body.as_object()) {
                for (k, v) in body {
                    base.insert(k.clone(), v.clone());
                }
            }
            Ok(base)
        }
        (Some(body), false) => Ok(body.clone()),
        (None, _) => Ok(serde_json::to_value(params)?),
    }
}

fn parse_response(url: &str, response: reqwest::blocking::Response) -> Result<ItemCollection> {
    let status = response.status();
    let text = response.text()?;
    if !status.is_success() {
        return Err(StacError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
            body: text.chars().take(ERROR_BODY_CHARS).collect(),
        });
    }
    Ok(serde_json::from_str(&text)?)
}
