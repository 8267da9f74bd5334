use std::time::Duration;

/// Default delay between two fetches of the same session.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Size of the quick first fetch used by the initial load.
pub const DEFAULT_PREVIEW_SIZE: u32 = 10;

/// Largest page the fine-grained strategy requests.
pub const FINE_PAGE_SIZE_CAP: u32 = 100;

/// Base pages covered per request once a coarse load decides to jump.
pub const DEFAULT_JUMP_PAGES: u32 = 5;

/// A coarse load only jumps when the dataset spans more pages than this.
pub const DEFAULT_JUMP_THRESHOLD_PAGES: u32 = 50;

/// Upper bound on `hitsPerPage` for a single request.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    /// Small pages, one page per iteration.
    Fine,
    /// Table-sized pages, jumping several pages per request for large scopes.
    Coarse,
}

/// Pacing and batch-size policy for one session.
///
/// The delay is the only backpressure the loader has: the backend offers no
/// flow control, so the strategy decides how hard a session may hit it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadStrategy {
    pub kind: StrategyKind,
    /// When set, the base page size is `min(table page size, cap)`.
    pub page_size_cap: Option<u32>,
    /// Records fetched by a preview request before the first full page.
    pub preview_size: Option<u32>,
    pub delay: Duration,
    pub jump_pages: u32,
    pub jump_threshold_pages: u32,
    pub max_page_size: u32,
}

impl LoadStrategy {
    pub fn fine() -> Self {
        Self {
            kind: StrategyKind::Fine,
            page_size_cap: Some(FINE_PAGE_SIZE_CAP),
            preview_size: None,
            delay: DEFAULT_PACING,
            jump_pages: 1,
            jump_threshold_pages: u32::MAX,
            max_page_size: FINE_PAGE_SIZE_CAP,
        }
    }

    pub fn coarse() -> Self {
        Self {
            kind: StrategyKind::Coarse,
            page_size_cap: None,
            preview_size: None,
            delay: DEFAULT_PACING,
            jump_pages: DEFAULT_JUMP_PAGES,
            jump_threshold_pages: DEFAULT_JUMP_THRESHOLD_PAGES,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_preview(mut self, records: u32) -> Self {
        self.preview_size = (records > 0).then_some(records);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_page_size_cap(mut self, cap: u32) -> Self {
        self.page_size_cap = Some(cap.max(1));
        self
    }

    pub fn with_jump(mut self, jump_pages: u32, threshold_pages: u32) -> Self {
        self.jump_pages = jump_pages.max(1);
        self.jump_threshold_pages = threshold_pages;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Page size used for cursor arithmetic, given the totals table's size.
    pub fn base_page_size(&self, table_page_size: u32) -> u32 {
        let size = match self.page_size_cap {
            Some(cap) => table_page_size.min(cap),
            None => table_page_size,
        };
        size.max(1)
    }

    /// Size of the preview request, never larger than a base page.
    pub fn preview_page_size(&self, base_page_size: u32) -> Option<u32> {
        self.preview_size.map(|n| n.min(base_page_size).max(1))
    }

    /// How many base pages each request should cover.
    ///
    /// `hinted_total_pages` is an early estimate of the scope size; fine loads
    /// and small scopes always step one page at a time.
    pub fn step_pages(&self, base_page_size: u32, hinted_total_pages: u32) -> u32 {
        if self.kind == StrategyKind::Fine
            || self.jump_pages <= 1
            || hinted_total_pages <= self.jump_threshold_pages
        {
            return 1;
        }
        let by_size = (self.max_page_size / base_page_size.max(1)).max(1);
        self.jump_pages.min(by_size)
    }
}

impl Default for LoadStrategy {
    fn default() -> Self {
        Self::fine()
    }
}
