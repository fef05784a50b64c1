//! Page slicing and navigation metadata.

use protocol::{Navigation, PageLink, PageSize};

/// Number of page links in the sliding window.
const WINDOW: usize = 7;

/// One page of a sorted item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Current page, 1-based, clamped into `[1, total_pages]`.
    pub page: usize,
    /// Effective page size.
    pub page_size: PageSize,
    /// Total number of pages, at least 1.
    pub total_pages: usize,
    /// Number of items across all pages.
    pub total_items: usize,
    /// Navigation metadata.
    pub navigation: Navigation,
}

/// Slice `items` into the requested page.
///
/// `PageSize::All` (and a zero count) yield a single page holding
/// everything.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: PageSize) -> Page<T> {
    let total_items = items.len();
    let per_page = match page_size {
        PageSize::Count(n) if n > 0 => Some(n),
        _ => None,
    };

    let total_pages = match per_page {
        Some(n) if total_items > n => total_items.div_ceil(n),
        _ => 1,
    };
    let page = page.clamp(1, total_pages);

    let items = match per_page {
        Some(n) => items.into_iter().skip((page - 1) * n).take(n).collect(),
        None => items,
    };

    Page {
        items,
        page,
        page_size,
        total_pages,
        total_items,
        navigation: navigation(page, total_pages),
    }
}

/// Navigation for `current` out of `total` pages.
///
/// The numbered window holds up to seven pages around the current one. The
/// first and last pages are always present, with an ellipsis wherever the
/// window does not reach them.
pub fn navigation(current: usize, total: usize) -> Navigation {
    let total = total.max(1);
    let current = current.clamp(1, total);

    let mut start = current.saturating_sub(WINDOW / 2).max(1);
    let end = (start + WINDOW - 1).min(total);
    start = end.saturating_sub(WINDOW - 1).max(1);

    let mut pages = Vec::with_capacity(WINDOW + 4);
    if start > 1 {
        pages.push(link(1, current));
        if start > 2 {
            pages.push(PageLink::Ellipsis);
        }
    }
    for number in start..=end {
        pages.push(link(number, current));
    }
    if end < total {
        if end + 1 < total {
            pages.push(PageLink::Ellipsis);
        }
        pages.push(link(total, current));
    }

    Navigation {
        previous: (current > 1).then(|| current - 1),
        next: (current < total).then(|| current + 1),
        pages,
    }
}

fn link(number: usize, current: usize) -> PageLink {
    PageLink::Page {
        number,
        current: number == current,
    }
}
