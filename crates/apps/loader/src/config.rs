use std::env;
use std::path::PathBuf;
use std::time::Duration;

use runtime::{
    LoadStrategy, DEFAULT_JUMP_PAGES, DEFAULT_JUMP_THRESHOLD_PAGES, DEFAULT_MAX_PAGE_SIZE,
    DEFAULT_PACING, DEFAULT_PREVIEW_SIZE, FINE_PAGE_SIZE_CAP,
};
use streaming::{ClientConfig, ControllerConfig};

pub const DEFAULT_DATASET_TYPE: &str = "flood_control";

/// Loader settings resolved from the environment, then from flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub dataset_type: String,
    pub totals_path: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub pacing: Duration,
    pub preview_size: u32,
    pub fine_page_cap: u32,
    pub jump_pages: u32,
    pub jump_threshold_pages: u32,
    pub max_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            dataset_type: DEFAULT_DATASET_TYPE.to_string(),
            totals_path: None,
            timeout: None,
            pacing: DEFAULT_PACING,
            preview_size: DEFAULT_PREVIEW_SIZE,
            fine_page_cap: FINE_PAGE_SIZE_CAP,
            jump_pages: DEFAULT_JUMP_PAGES,
            jump_threshold_pages: DEFAULT_JUMP_THRESHOLD_PAGES,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            endpoint: env_var_string("LOADER_ENDPOINT"),
            api_key: env_var_string("LOADER_API_KEY"),
            dataset_type: env_var_string("LOADER_DATASET_TYPE").unwrap_or(d.dataset_type),
            totals_path: env_var_string("LOADER_TOTALS_PATH").map(PathBuf::from),
            timeout: env_var_string("LOADER_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
            pacing: Duration::from_millis(env_var_u64(
                "LOADER_PACING_MS",
                d.pacing.as_millis() as u64,
            )),
            preview_size: env_var_u32("LOADER_PREVIEW_SIZE", d.preview_size),
            fine_page_cap: env_var_u32("LOADER_FINE_PAGE_CAP", d.fine_page_cap),
            jump_pages: env_var_u32("LOADER_JUMP_PAGES", d.jump_pages),
            jump_threshold_pages: env_var_u32(
                "LOADER_JUMP_THRESHOLD_PAGES",
                d.jump_threshold_pages,
            ),
            max_page_size: env_var_u32("LOADER_MAX_PAGE_SIZE", d.max_page_size),
        }
    }

    pub fn client_config(&self, endpoint: &str) -> ClientConfig {
        let mut c = ClientConfig::new(endpoint, self.dataset_type.clone());
        if let Some(key) = &self.api_key {
            c = c.with_api_key(key.clone());
        }
        if let Some(timeout) = self.timeout {
            c = c.with_timeout(timeout);
        }
        c
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let fine = LoadStrategy::fine()
            .with_delay(self.pacing)
            .with_page_size_cap(self.fine_page_cap);
        ControllerConfig {
            initial: fine.clone().with_preview(self.preview_size),
            region: fine,
            all: LoadStrategy::coarse()
                .with_delay(self.pacing)
                .with_jump(self.jump_pages, self.jump_threshold_pages)
                .with_max_page_size(self.max_page_size),
        }
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
