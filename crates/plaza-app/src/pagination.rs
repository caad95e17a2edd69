//! Pagination cursors and scroll triggers.

/// Distance from the end of a list at which the next page is requested.
pub const LOAD_MORE_THRESHOLD_PX: u32 = 500;

/// Distance from the bottom of a chat at which it counts as read.
pub const NEAR_BOTTOM_PX: u32 = 100;

/// Scroll geometry reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Pixels scrolled from the top
    pub scroll_top: u32,
    /// Visible height
    pub client_height: u32,
    /// Total content height
    pub scroll_height: u32,
}

impl Viewport {
    /// Create a viewport.
    pub fn new(scroll_top: u32, client_height: u32, scroll_height: u32) -> Self {
        Self { scroll_top, client_height, scroll_height }
    }

    /// Within [`LOAD_MORE_THRESHOLD_PX`] of the end.
    pub fn near_end(&self) -> bool {
        self.bottom_edge().saturating_add(LOAD_MORE_THRESHOLD_PX) >= self.scroll_height
    }

    /// Scrolled all the way up.
    pub fn at_top(&self) -> bool {
        self.scroll_top == 0
    }

    /// Within [`NEAR_BOTTOM_PX`] of the bottom.
    pub fn near_bottom(&self) -> bool {
        self.bottom_edge().saturating_add(NEAR_BOTTOM_PX) >= self.scroll_height
    }

    fn bottom_edge(&self) -> u32 {
        self.scroll_top.saturating_add(self.client_height)
    }

    /// Scroll offset that keeps the same content in view after older content
    /// was prepended and the total height grew from `previous_height`.
    pub fn restored_after_prepend(&self, previous_height: u32) -> u32 {
        self.scroll_top.saturating_add(self.scroll_height.saturating_sub(previous_height))
    }
}

/// Page cursor for a paged list.
///
/// Pages are 1-based. At most one page is in flight, and once the server
/// reports the last page the cursor stays exhausted until [`Cursor::reset`].
///
/// Every reset starts a new generation. Requests carry the generation they
/// were issued in, and a reply is applied only through [`Cursor::accepts`]:
/// same generation and the page currently in flight. Replies to requests made
/// before a refresh are thereby dropped instead of landing in the new list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Last page applied. Zero before the first.
    current: u32,
    in_flight: Option<u32>,
    exhausted: bool,
    generation: u64,
}

impl Cursor {
    /// Cursor before the first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next page. `None` while a page is in flight or when
    /// exhausted.
    pub fn begin_next(&mut self) -> Option<u32> {
        if self.in_flight.is_some() || self.exhausted {
            return None;
        }
        let page = self.current + 1;
        self.in_flight = Some(page);
        Some(page)
    }

    /// Whether a reply for `page` issued in `generation` is the one awaited.
    pub fn accepts(&self, page: u32, generation: u64) -> bool {
        generation == self.generation && self.in_flight == Some(page)
    }

    /// Apply a page.
    pub fn complete(&mut self, page: u32, total_pages: u32) {
        self.in_flight = None;
        self.current = self.current.max(page);
        self.exhausted = page >= total_pages;
    }

    /// Release a failed page so it can be retried.
    pub fn fail(&mut self) {
        self.in_flight = None;
    }

    /// Back to before the first page, invalidating anything still in flight.
    ///
    /// A cursor that never issued a page keeps its generation.
    pub fn reset(&mut self) {
        let touched = self.current > 0 || self.in_flight.is_some();
        let generation = if touched { self.generation + 1 } else { self.generation };
        *self = Self { generation, ..Self::default() };
    }

    /// Requests issued now carry this generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last page applied.
    pub fn current_page(&self) -> u32 {
        self.current
    }

    /// A page is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The last page has been applied.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
