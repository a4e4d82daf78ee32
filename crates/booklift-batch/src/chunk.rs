//! Bounded, ordered buffer of records handed to a sink in one write

use booklift_common::Record;

/// Default number of records per chunk (the commit interval)
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// An ordered sequence of at most `capacity` records.
///
/// Records keep extraction order; a chunk is sealed when full or when the
/// source is exhausted, written once and then dropped.
#[derive(Debug)]
pub struct Chunk {
    capacity: usize,
    records: Vec<Record>,
}

impl Chunk {
    /// # Panics
    ///
    /// Panics if `capacity` is zero; settings validation rejects that earlier.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "chunk capacity must be positive");
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
        }
    }

    /// Append a record. Returns the record back if the chunk is already full.
    pub fn push(&mut self, record: Record) -> Result<(), Record> {
        if self.is_full() {
            return Err(record);
        }
        self.records.push(record);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Empty the buffer for the next fill, keeping its allocation
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_never_exceeds_capacity() {
        let mut chunk = Chunk::with_capacity(2);
        assert!(chunk.push(Record::new(1, "a")).is_ok());
        assert!(chunk.push(Record::new(2, "b")).is_ok());
        assert!(chunk.is_full());

        let rejected = chunk.push(Record::new(3, "c"));
        assert_eq!(rejected, Err(Record::new(3, "c")));
        assert_eq!(chunk.len(), 2);
    }

    #[test]
    fn test_chunk_preserves_order_and_clears() {
        let mut chunk = Chunk::with_capacity(DEFAULT_CHUNK_SIZE);
        for id in [3, 1, 2] {
            let _ = chunk.push(Record::new(id, format!("n{}", id)));
        }
        let ids: Vec<i64> = chunk.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        chunk.clear();
        assert!(chunk.is_empty());
        assert_eq!(chunk.capacity(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    #[should_panic(expected = "chunk capacity must be positive")]
    fn test_zero_capacity_is_rejected() {
        let _ = Chunk::with_capacity(0);
    }
}
