use std::collections::BTreeMap;

use crate::shared::error::JobError;

/// Reorders task results so they leave strictly by frame index.
///
/// Results are pushed in completion order; `pop_ready` hands back the
/// entry at the write cursor while one is buffered. Only the single
/// consumer thread touches it, so it needs no locking.
pub struct OrderedWriter<T> {
    pending: BTreeMap<usize, T>,
    cursor: usize,
}

impl<T> OrderedWriter<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            cursor: 0,
        }
    }

    /// Next index expected for emission.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Buffer one result. An index that was already emitted or is already
    /// buffered means two tasks claimed the same frame.
    pub fn push(&mut self, index: usize, item: T) -> Result<(), JobError> {
        if index < self.cursor || self.pending.contains_key(&index) {
            return Err(JobError::OrderingFault {
                next_expected: self.cursor,
                buffered: vec![index],
            });
        }
        self.pending.insert(index, item);
        Ok(())
    }

    /// Remove and return the result at the cursor, advancing it.
    pub fn pop_ready(&mut self) -> Option<(usize, T)> {
        let item = self.pending.remove(&self.cursor)?;
        let index = self.cursor;
        self.cursor += 1;
        Some((index, item))
    }

    /// Called once every task has completed. Anything still buffered, or a
    /// cursor short of `expected_total`, means a result was lost.
    pub fn finish(self, expected_total: usize) -> Result<(), JobError> {
        if self.pending.is_empty() && self.cursor == expected_total {
            return Ok(());
        }
        Err(JobError::OrderingFault {
            next_expected: self.cursor,
            buffered: self.pending.into_keys().collect(),
        })
    }
}

impl<T> Default for OrderedWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}
