// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Insertion positions for new children.

use alloc::string::ToString;

use crate::error::{Error, Result};

/// Where [`Tree::add_child`](super::Tree::add_child) inserts a new child.
///
/// Positions past the end of the child list are clamped to the end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChildIndex {
    /// After the last child.
    #[default]
    Append,
    /// At this position among the existing children.
    At(usize),
}

impl ChildIndex {
    /// Parses a textual index: a non-negative integer, or `-1` for
    /// [`Append`](Self::Append).
    ///
    /// An empty string is [`Error::UndefinedIndex`]; anything else that is
    /// not such an integer is [`Error::IncorrectIndex`].
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::UndefinedIndex);
        }
        let raw: i64 = text
            .parse()
            .map_err(|_| Error::IncorrectIndex(text.to_string()))?;
        Self::try_from(raw)
    }

    /// Returns the insertion position in a list of `len` children.
    pub(crate) fn resolve(self, len: usize) -> usize {
        match self {
            Self::Append => len,
            Self::At(pos) => pos.min(len),
        }
    }
}

impl TryFrom<i64> for ChildIndex {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(Self::Append),
            _ => usize::try_from(raw)
                .map(Self::At)
                .map_err(|_| Error::IncorrectIndex(raw.to_string())),
        }
    }
}

impl From<usize> for ChildIndex {
    fn from(pos: usize) -> Self {
        Self::At(pos)
    }
}
