//! Paging parameters and result pages

use serde::{Deserialize, Serialize};

/// Which slice of a result set to return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingParams {
    /// Number of items to skip
    pub skip: Option<i64>,
    /// Number of items to return
    pub take: Option<i64>,
    /// Whether the page should carry the total number of matching items
    #[serde(default)]
    pub total: bool,
}

impl PagingParams {
    pub fn new(skip: Option<i64>, take: Option<i64>, total: bool) -> Self {
        Self { skip, take, total }
    }

    /// Skip value, raised to `min_skip`; `min_skip` when unset
    pub fn get_skip(&self, min_skip: i64) -> i64 {
        match self.skip {
            Some(skip) => skip.max(min_skip),
            None => min_skip,
        }
    }

    /// Take value, clamped to `[0, max_take]`; `max_take` when unset
    pub fn get_take(&self, max_take: i64) -> i64 {
        match self.take {
            Some(take) => take.clamp(0, max_take.max(0)),
            None => max_take,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPage<T> {
    pub data: Vec<T>,
    /// Total number of matching items, when requested
    pub total: Option<i64>,
}

impl<T> DataPage<T> {
    pub fn new(data: Vec<T>, total: Option<i64>) -> Self {
        Self { data, total }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_and_take_resolution() {
        let unset = PagingParams::default();
        assert_eq!(unset.get_skip(-1), -1);
        assert_eq!(unset.get_take(100), 100);

        let paging = PagingParams::new(Some(4), Some(250), true);
        assert_eq!(paging.get_skip(-1), 4);
        assert_eq!(paging.get_take(100), 100);

        let negative = PagingParams::new(Some(-5), Some(-1), false);
        assert_eq!(negative.get_skip(-1), -1);
        assert_eq!(negative.get_take(100), 0);
    }
}
