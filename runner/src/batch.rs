use std::num::NonZeroUsize;

/// A contiguous run of work items that ends up in a single batch script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a, T> {
    pub index: usize,
    pub items: &'a [T],
}

/// Fixed-size partition of an ordered slice.
///
/// Unlike an exhausting iterator the plan can be walked any number of times, every walk yields
/// the same chunks. All chunks hold `size` items except the last one, which holds the remainder.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan<'a, T> {
    items: &'a [T],
    size: NonZeroUsize,
}

/// number of chunks needed for `items` items
pub fn chunk_count(items: usize, size: NonZeroUsize) -> usize {
    items.div_ceil(size.get())
}

impl<'a, T> ChunkPlan<'a, T> {
    pub fn new(items: &'a [T], size: NonZeroUsize) -> Self {
        Self { items, size }
    }

    pub fn len(&self) -> usize {
        chunk_count(self.items.len(), self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Chunk<'a, T>> + Clone {
        self.items
            .chunks(self.size.get())
            .enumerate()
            .map(|(index, items)| Chunk { index, items })
    }
}
