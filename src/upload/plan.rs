//! Chunk planning.

/// A byte range `[offset, offset + len)` of the uploaded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    /// Offset of the first byte.
    pub offset: u64,
    /// Number of bytes. Never zero.
    pub len: u64,
}

impl ChunkRange {
    /// Returns the offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// The lazy sequence of chunks covering `[0, total_size)`.
///
/// Every chunk is `chunk_size` bytes except the last, which holds the
/// remainder. The plan is a pure function of its inputs; cloning it
/// restarts the sequence.
///
/// ```rust
/// use nightfall::upload::ChunkPlan;
///
/// let lens: Vec<u64> = ChunkPlan::new(12, 5).map(|c| c.len).collect();
/// assert_eq!(lens, vec![5, 5, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    next_offset: u64,
}

impl ChunkPlan {
    /// Creates a plan. A zero `chunk_size` yields no chunks.
    pub fn new(total_size: u64, chunk_size: u64) -> Self {
        Self {
            total_size,
            chunk_size,
            next_offset: 0,
        }
    }

    /// Returns the number of chunks not yet yielded.
    pub fn remaining(&self) -> u64 {
        if self.chunk_size == 0 || self.next_offset >= self.total_size {
            return 0;
        }
        (self.total_size - self.next_offset).div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<ChunkRange> {
        if self.chunk_size == 0 || self.next_offset >= self.total_size {
            return None;
        }

        let offset = self.next_offset;
        let len = self.chunk_size.min(self.total_size - offset);
        self.next_offset = offset + len;
        Some(ChunkRange { offset, len })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl std::iter::FusedIterator for ChunkPlan {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(total: u64, chunk: u64) {
        let chunks: Vec<ChunkRange> = ChunkPlan::new(total, chunk).collect();

        let mut expected_offset = 0;
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.offset, expected_offset, "gap before chunk {i}");
            assert!(c.len > 0, "zero-length chunk {i}");
            assert!(c.len <= chunk);
            if i + 1 < chunks.len() {
                assert_eq!(c.len, chunk, "only the last chunk may be short");
            }
            expected_offset = c.end();
        }
        assert_eq!(expected_offset, total, "chunks must cover the content");
    }

    #[test]
    fn test_plan_covers_content() {
        for total in [0, 1, 4, 5, 6, 15, 16, 1000, 1023] {
            for chunk in [1, 2, 5, 7, 15, 64, 2048] {
                assert_tiles(total, chunk);
            }
        }
    }

    #[test]
    fn test_even_split() {
        let chunks: Vec<_> = ChunkPlan::new(15, 5).collect();
        assert_eq!(
            chunks,
            vec![
                ChunkRange { offset: 0, len: 5 },
                ChunkRange { offset: 5, len: 5 },
                ChunkRange { offset: 10, len: 5 },
            ]
        );
    }

    #[test]
    fn test_single_chunk() {
        let chunks: Vec<_> = ChunkPlan::new(15, 15).collect();
        assert_eq!(chunks, vec![ChunkRange { offset: 0, len: 15 }]);

        let chunks: Vec<_> = ChunkPlan::new(3, 100).collect();
        assert_eq!(chunks, vec![ChunkRange { offset: 0, len: 3 }]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(ChunkPlan::new(0, 5).count(), 0);
        assert_eq!(ChunkPlan::new(10, 0).count(), 0);
    }

    #[test]
    fn test_plan_is_restartable() {
        let plan = ChunkPlan::new(23, 4);
        let first: Vec<_> = plan.clone().collect();
        let second: Vec<_> = plan.collect();
        assert_eq!(first, second);
        assert_eq!(first, ChunkPlan::new(23, 4).collect::<Vec<_>>());
    }

    #[test]
    fn test_remaining() {
        let mut plan = ChunkPlan::new(11, 5);
        assert_eq!(plan.remaining(), 3);
        plan.next();
        assert_eq!(plan.remaining(), 2);
        assert_eq!(plan.size_hint(), (2, Some(2)));
    }
}
