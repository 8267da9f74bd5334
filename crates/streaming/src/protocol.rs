//! Wire format of the search backend.
//!
//! Requests are `POST`ed as JSON:
//! `{ "hitsPerPage": 100, "page": 1, "filter": "type = \"...\" AND Region = \"...\"" }`
//! and answered with `{ "hits": [...], "totalHits": 1234 }`. `page` is 1-based.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LoadError;
use crate::record::Record;

/// Body of one paginated search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub hits_per_page: u32,
    pub page: u32,
    pub filter: String,
}

/// Raw search response. Fields are optional so that a response missing
/// them can be reported as malformed instead of failing to decode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Option<Vec<Value>>,
    #[serde(default, alias = "estimatedTotalHits")]
    pub total_hits: Option<u64>,
}

impl SearchResponse {
    pub fn into_batch(self) -> Result<Batch, LoadError> {
        let Some(hits) = self.hits else {
            return Err(LoadError::malformed("response has no `hits` array"));
        };
        let hits = hits
            .into_iter()
            .map(Record::from_hit)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Batch {
            hits,
            total_hits: self.total_hits,
        })
    }
}

/// One page of records returned by a single fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub hits: Vec<Record>,
    /// Backend's own count. A hint only; it can lag behind ingestion.
    pub total_hits: Option<u64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Builds `type = "<dataset>"`, optionally `AND Region = "<region>"`.
pub fn filter_expression(dataset_type: &str, region: Option<&str>) -> String {
    let mut filter = format!("type = {}", quote(dataset_type));
    if let Some(region) = region {
        filter.push_str(" AND Region = ");
        filter.push_str(&quote(region));
    }
    filter
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
