//! Fixed-size pagination over review batches.

use serde::Serialize;

use crate::{Error, Result};

/// Cutout triplets per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Where a page sits within the full batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
  /// 1-based page number.
  pub page:     usize,
  pub pages:    usize,
  pub per_page: usize,
  pub total:    usize,
  /// Index of the first item on this page.
  pub start:    usize,
  /// One past the index of the last item on this page.
  pub end:      usize,
}

/// Slice out page `page` (1-based) of `items`.
///
/// An empty batch still has one (empty) page.
pub fn paginate<T>(
  items: &[T],
  page: usize,
  per_page: usize,
) -> Result<(PageInfo, &[T])> {
  let per_page = per_page.max(1);
  let total = items.len();
  let pages = total.div_ceil(per_page).max(1);

  if page == 0 || page > pages {
    return Err(Error::PageOutOfRange { page, pages });
  }

  let start = (page - 1) * per_page;
  let end = (start + per_page).min(total);

  let info = PageInfo { page, pages, per_page, total, start, end };
  Ok((info, &items[start..end]))
}
