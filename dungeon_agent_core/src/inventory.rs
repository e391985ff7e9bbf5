use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Item;

/// Counts of each item held.
///
/// This is a plain `Copy` value: every search branch owns its own snapshot,
/// so mutating one never affects a sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Inventory {
    counts: [u32; 4],
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn slot(item: Item) -> usize {
        match item {
            Item::Axe => 0,
            Item::Dynamite => 1,
            Item::Key => 2,
            Item::Gold => 3,
        }
    }

    pub fn get(&self, item: Item) -> u32 {
        self.counts[Self::slot(item)]
    }

    pub fn has(&self, item: Item) -> bool {
        self.get(item) > 0
    }

    pub fn add(&mut self, item: Item) {
        self.counts[Self::slot(item)] += 1;
    }

    /// Consumes one of `item`. Using an item that is not held leaves the
    /// count at zero.
    pub fn use_item(&mut self, item: Item) {
        let count = &mut self.counts[Self::slot(item)];
        if *count == 0 {
            tracing::trace!("use of {:?} with none held ignored", item);
        }
        *count = count.saturating_sub(1);
    }

    /// Returns a copy with one more `item`.
    pub fn with(mut self, item: Item) -> Self {
        self.add(item);
        self
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in Item::ALL.into_iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", item.symbol(), self.get(item))?;
        }
        write!(f, "]")
    }
}
