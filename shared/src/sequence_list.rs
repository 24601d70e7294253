use thiserror::Error;

/// Errors that can occur during SequenceList operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Attempted to insert a duplicate sequence number into the list
    #[error("Duplicate sequence number {sequence} not allowed in SequenceList")]
    DuplicateSequence { sequence: u64 },
}

/// A list kept sorted by sequence number, rejecting duplicates.
///
/// Items usually arrive in order, so insertion scans from the back.
#[derive(Clone, Debug)]
pub struct SequenceList<T> {
    list: Vec<(u64, T)>,
}

impl<T> Default for SequenceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SequenceList<T> {
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn front(&self) -> Option<&(u64, T)> {
        self.list.first()
    }

    pub fn contains_scan_from_back(&self, sequence: u64) -> bool {
        for (old_sequence, _) in self.list.iter().rev() {
            if *old_sequence == sequence {
                return true;
            }
            if *old_sequence < sequence {
                return false;
            }
        }
        false
    }

    /// Inserts an item at its ordered position.
    /// Returns an error if the sequence number is already present.
    pub fn try_insert_scan_from_back(&mut self, sequence: u64, item: T) -> Result<(), SequenceError> {
        let mut index = self.list.len();

        loop {
            if index == 0 {
                // made it all the way through, insert at front
                self.list.insert(0, (sequence, item));
                return Ok(());
            }

            index -= 1;

            let old_sequence = self.list[index].0;
            if old_sequence == sequence {
                return Err(SequenceError::DuplicateSequence { sequence });
            }
            if old_sequence < sequence {
                self.list.insert(index + 1, (sequence, item));
                return Ok(());
            }
        }
    }

    /// Removes every item, in ascending sequence order
    pub fn drain_ordered(&mut self) -> Vec<(u64, T)> {
        std::mem::take(&mut self.list)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u64, T)> {
        self.list.iter()
    }
}
