use serde::{Deserialize, Serialize};

use crate::regions::RegionDirectory;
use crate::totals::{
    DEFAULT_REGION_TOTALS, GLOBAL_PAGE_SIZE, REGION_PAGE_SIZE, ScopeTotals, Totals,
};
use crate::{Scope, TotalsError};

/// Snapshot shipped with the crate, computed offline from the live index.
pub const BUILTIN_SCOPE_TOTALS: &str = include_str!("../data/scope_totals.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsEntry {
    pub total_hits: u64,
    pub total_pages: u32,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl TotalsEntry {
    fn to_totals(&self, default_page_size: u32) -> Result<Totals, TotalsError> {
        let page_size = self.page_size.unwrap_or(default_page_size);
        if page_size == 0 {
            return Err(TotalsError::Invalid("pageSize must be positive".to_string()));
        }
        Ok(Totals::new(self.total_hits, self.total_pages, page_size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    pub name: String,
    /// Value of the backend's `Region` field; defaults to `name`.
    #[serde(default)]
    pub backend_key: Option<String>,
    #[serde(flatten)]
    pub totals: TotalsEntry,
}

/// On-disk layout of the totals table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeTableDocument {
    pub global: TotalsEntry,
    #[serde(default)]
    pub default_region: Option<TotalsEntry>,
    #[serde(default)]
    pub regions: Vec<RegionEntry>,
}

/// Parsed totals table plus the region directory derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTable {
    pub totals: ScopeTotals,
    pub regions: RegionDirectory,
    fingerprint: String,
}

impl ScopeTable {
    pub fn builtin() -> Result<Self, TotalsError> {
        Self::from_json(BUILTIN_SCOPE_TOTALS)
    }

    pub fn from_json(raw: &str) -> Result<Self, TotalsError> {
        let doc: ScopeTableDocument = serde_json::from_str(raw)?;
        let mut table = Self::from_document(&doc)?;
        table.fingerprint = fingerprint(raw.as_bytes());
        Ok(table)
    }

    pub fn from_document(doc: &ScopeTableDocument) -> Result<Self, TotalsError> {
        let global = doc.global.to_totals(GLOBAL_PAGE_SIZE)?;
        let default_region = match &doc.default_region {
            Some(entry) => entry.to_totals(REGION_PAGE_SIZE)?,
            None => DEFAULT_REGION_TOTALS,
        };

        let mut totals = ScopeTotals::new(global, default_region);
        let mut regions = RegionDirectory::new();
        for entry in &doc.regions {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(TotalsError::Invalid("region with empty name".to_string()));
            }
            if name == Scope::GLOBAL_KEY {
                return Err(TotalsError::Invalid(format!(
                    "region name {name:?} is reserved"
                )));
            }
            let region_totals = entry.totals.to_totals(REGION_PAGE_SIZE)?;
            if totals
                .insert_region(name.to_string(), region_totals)
                .is_some()
            {
                return Err(TotalsError::Invalid(format!("duplicate region {name:?}")));
            }
            let backend_key = entry.backend_key.as_deref().unwrap_or(name);
            regions.insert(name.to_string(), backend_key.to_string());
        }

        let fingerprint = match serde_json::to_vec(doc) {
            Ok(bytes) => self::fingerprint(&bytes),
            Err(_) => String::new(),
        };

        Ok(Self {
            totals,
            regions,
            fingerprint,
        })
    }

    /// Content hash of the document this table was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
