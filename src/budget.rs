//! Per-query memory accounting.
//!
//! Search code grows its hit and clump vectors through [`SearchBudget::reserve`],
//! which charges the bytes against a fixed limit and then asks the allocator with
//! `try_reserve_exact`. Either failure becomes a [`SearchError`] that unwinds the query
//! through ordinary `Result`s, never the process.

use std::mem::size_of;

use crate::error::SearchError;

/// Byte budget for one query.
#[derive(Debug)]
pub struct SearchBudget {
    limit: usize,
    used: usize,
}

impl SearchBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Effectively unbounded; for in-process callers.
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Account for `bytes` more.
    pub fn charge(&mut self, bytes: usize) -> Result<(), SearchError> {
        let next = self.used.saturating_add(bytes);
        if next > self.limit {
            return Err(SearchError::BudgetExhausted { limit: self.limit });
        }
        self.used = next;
        Ok(())
    }

    /// Make room for `additional` more elements in `v`, charging the growth.
    /// Capacity grows exactly, so the charge covers every byte allocated.
    pub fn reserve<T>(&mut self, v: &mut Vec<T>, additional: usize) -> Result<(), SearchError> {
        let old_cap = v.capacity();
        let needed = v.len().saturating_add(additional);
        if needed <= old_cap {
            return Ok(());
        }
        let bytes = (needed - old_cap).saturating_mul(size_of::<T>());
        self.charge(bytes)?;
        v.try_reserve_exact(additional)
            .map_err(|_| SearchError::AllocationFailed { bytes })?;
        // the allocator may still hand back more than asked for
        let grown = (v.capacity() - old_cap).saturating_mul(size_of::<T>());
        self.charge(grown.saturating_sub(bytes))
    }

    /// Push one element, charging on growth.
    #[inline]
    pub fn push<T>(&mut self, v: &mut Vec<T>, item: T) -> Result<(), SearchError> {
        if v.len() == v.capacity() {
            let grow = v.capacity().max(16);
            self.reserve(v, grow)?;
        }
        v.push(item);
        Ok(())
    }
}

/// Memory held back while a query runs and released when it fails, so the
/// error response can still be formatted and sent.
#[derive(Debug)]
pub struct Ripcord {
    reserve: Option<Vec<u8>>,
    size: usize,
}

impl Ripcord {
    pub fn new(size: usize) -> Self {
        Self {
            reserve: Some(vec![0u8; size]),
            size,
        }
    }

    /// Let go of the reserve.
    pub fn pull(&mut self) {
        self.reserve = None;
    }

    pub fn is_pulled(&self) -> bool {
        self.reserve.is_none()
    }

    /// Take the reserve back before the next request; a failed reallocation
    /// leaves it pulled.
    pub fn rearm(&mut self) {
        if self.reserve.is_none() {
            let mut v = Vec::new();
            if v.try_reserve_exact(self.size).is_ok() {
                v.resize(self.size, 0);
                self.reserve = Some(v);
            }
        }
    }
}

