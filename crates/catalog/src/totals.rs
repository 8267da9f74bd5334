use std::collections::BTreeMap;

use crate::Scope;

pub const GLOBAL_PAGE_SIZE: u32 = 200;
pub const REGION_PAGE_SIZE: u32 = 100;

/// Used for region keys missing from the table. Large enough to hold any real
/// region, small enough that a session for an unknown key still terminates.
pub const DEFAULT_REGION_TOTALS: Totals = Totals {
    total_hits: 5_000,
    total_pages: 50,
    page_size: REGION_PAGE_SIZE,
};

/// Precomputed size of one scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Totals {
    pub total_hits: u64,
    pub total_pages: u32,
    pub page_size: u32,
}

impl Totals {
    pub fn new(total_hits: u64, total_pages: u32, page_size: u32) -> Self {
        Self {
            total_hits,
            total_pages,
            page_size,
        }
    }

    /// Re-expresses the page count for a different page size.
    pub fn with_page_size(self, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        if page_size == self.page_size {
            return self;
        }
        Self {
            total_hits: self.total_hits,
            total_pages: pages_for(self.total_hits, page_size),
            page_size,
        }
    }
}

/// `ceil(hits / page_size)`, saturating at `u32::MAX`.
pub fn pages_for(hits: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(hits.div_ceil(size)).unwrap_or(u32::MAX)
}

/// Lookup of precomputed totals by scope key.
///
/// These counts decide when a session stops. Backend-reported totals can lag
/// during heavy ingestion, so they never override this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTotals {
    global: Totals,
    default_region: Totals,
    regions: BTreeMap<String, Totals>,
}

impl ScopeTotals {
    pub fn new(global: Totals, default_region: Totals) -> Self {
        Self {
            global,
            default_region,
            regions: BTreeMap::new(),
        }
    }

    pub fn with_region(mut self, name: impl Into<String>, totals: Totals) -> Self {
        self.regions.insert(name.into(), totals);
        self
    }

    pub(crate) fn insert_region(&mut self, name: String, totals: Totals) -> Option<Totals> {
        self.regions.insert(name, totals)
    }

    /// Never fails: unknown region keys get the default entry.
    pub fn total_for(&self, scope_key: &str) -> Totals {
        if scope_key == Scope::GLOBAL_KEY {
            return self.global;
        }
        self.regions
            .get(scope_key)
            .copied()
            .unwrap_or(self.default_region)
    }

    pub fn totals(&self, scope: &Scope) -> Totals {
        self.total_for(scope.key())
    }

    pub fn contains(&self, scope_key: &str) -> bool {
        scope_key == Scope::GLOBAL_KEY || self.regions.contains_key(scope_key)
    }

    pub fn default_region(&self) -> Totals {
        self.default_region
    }

    /// Known regions in name order.
    pub fn regions(&self) -> impl Iterator<Item = (&str, Totals)> {
        self.regions.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
