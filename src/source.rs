//! Concatenated coordinate space → originating target sequence.
//!
//! Sources are laid end to end in build order, so the table is sorted and
//! gap-free by construction; lookups are a binary search over `[start, end)`.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::IndexError;

/// Largest concatenated size an index can address.
pub const MAX_TOTAL_BASES: u64 = 4 * 1024 * 1024 * 1024 - 1;

/// Longest source name; a clump line with nine numeric columns must still fit
/// a short string.
pub const MAX_NAME_LEN: usize = 128;

/// One target sequence placed in concatenated space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeqSource {
    /// Unique name given at build time.
    pub name: String,
    /// First concatenated offset (inclusive).
    pub start: u32,
    /// One past the last concatenated offset.
    pub end: u32,
}

impl SeqSource {
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
    #[inline]
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Sorted, non-overlapping source ranges.
#[derive(Clone, Debug, Default)]
pub struct SequenceSourceTable {
    sources: Vec<SeqSource>,
}

impl SequenceSourceTable {
    /// Lay out `(name, length)` pairs end to end, in order.
    pub fn from_lengths<'a, I>(entries: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut sources = Vec::new();
        let mut seen = HashSet::new();
        let mut offset: u64 = 0;
        for (name, len) in entries {
            if name.len() > MAX_NAME_LEN {
                let mut cut = 32;
                while !name.is_char_boundary(cut) {
                    cut -= 1;
                }
                return Err(IndexError::NameTooLong {
                    name: name[..cut].to_string(),
                    max: MAX_NAME_LEN,
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(IndexError::DuplicateSource(name.to_string()));
            }
            let end = offset + len as u64;
            if end > MAX_TOTAL_BASES {
                return Err(IndexError::TooLarge {
                    limit: MAX_TOTAL_BASES,
                    total: end,
                });
            }
            sources.push(SeqSource {
                name: name.to_string(),
                start: offset as u32,
                end: end as u32,
            });
            offset = end;
        }
        Ok(Self { sources })
    }

    /// Number of sources.
    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Total size of concatenated space.
    pub fn total_size(&self) -> u32 {
        self.sources.last().map(|s| s.end).unwrap_or(0)
    }

    pub fn get(&self, id: usize) -> Option<&SeqSource> {
        self.sources.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeqSource> {
        self.sources.iter()
    }

    /// Index of the source containing `offset`, or `None` past the end.
    pub fn find(&self, offset: u32) -> Option<usize> {
        self.sources
            .binary_search_by(|s| {
                if offset < s.start {
                    Ordering::Greater
                } else if offset >= s.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()
    }

    /// `(source id, local offset)` for a concatenated offset.
    pub fn locate(&self, offset: u32) -> Option<(usize, u32)> {
        let id = self.find(offset)?;
        Some((id, offset - self.sources[id].start))
    }

    /// Source id by exact name.
    pub fn find_named(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.name == name)
    }
}
