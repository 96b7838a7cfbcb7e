use crate::error::{Error, Result};

/// Page size bounds, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl FeedLimits {
    /// A zero limit is an error; oversized limits are capped at `max_limit`.
    pub fn page(&self, offset: Option<u32>, limit: Option<u32>) -> Result<Page> {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(Error::validation("limit must be at least 1"));
        }
        Ok(Page {
            offset: offset.unwrap_or(0),
            limit: limit.min(self.max_limit),
        })
    }
}

impl Page {
    /// A full page means there may be more rows after it.
    pub fn next_offset(&self, fetched: usize) -> Option<u32> {
        (fetched as u32 >= self.limit).then(|| self.offset.saturating_add(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_bounded() {
        let limits = FeedLimits::default();
        assert_eq!(limits.page(None, None).unwrap(), Page { offset: 0, limit: 20 });
        assert_eq!(limits.page(Some(40), Some(500)).unwrap(), Page { offset: 40, limit: 100 });
        assert!(limits.page(None, Some(0)).is_err());
    }

    #[test]
    fn next_offset_only_on_full_pages() {
        let page = Page { offset: 20, limit: 10 };
        assert_eq!(page.next_offset(10), Some(30));
        assert_eq!(page.next_offset(3), None);
    }
}
