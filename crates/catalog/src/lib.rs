//! Static scope metadata for the progressive loader.
//!
//! Everything here is read-only after load: precomputed record/page totals per
//! scope (the termination oracle) and the mapping from human-readable region
//! names to the backend's region values.

pub mod regions;
pub mod table;
pub mod totals;

pub use regions::*;
pub use table::*;
pub use totals::*;

/// The filter context of a load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    /// Human-readable region name, as shown to the user.
    Region(String),
}

impl Scope {
    /// Scope key of [`Scope::Global`] in the totals table.
    pub const GLOBAL_KEY: &'static str = "global";

    pub fn region(name: impl Into<String>) -> Self {
        Scope::Region(name.into())
    }

    pub fn from_key(key: &str) -> Self {
        if key == Self::GLOBAL_KEY {
            Scope::Global
        } else {
            Scope::Region(key.to_string())
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Scope::Global => Self::GLOBAL_KEY,
            Scope::Region(name) => name,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Region(name) => write!(f, "region:{name}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TotalsError {
    #[error("scope totals document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scope totals document is invalid: {0}")]
    Invalid(String),
}
