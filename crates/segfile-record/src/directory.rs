//! Segment directory capability.
//!
//! A directory is a doubly linked list of segment entries. Traversal state
//! lives in the entry values themselves, never in the handle, so any number
//! of traversals may be interleaved on one open file.

use crate::Result;

/// A doubly linked list of segments inside one file
pub trait SegmentDirectory {
    /// Position-carrying entry for one segment
    type Entry: Clone;

    fn first_segment(&self) -> Result<Option<Self::Entry>>;

    fn last_segment(&self) -> Result<Option<Self::Entry>>;

    fn next_segment(&self, entry: &Self::Entry) -> Result<Option<Self::Entry>>;

    fn previous_segment(&self, entry: &Self::Entry) -> Result<Option<Self::Entry>>;

    /// Iterate from the first segment to the last.
    fn segments(&self) -> Segments<'_, Self>
    where
        Self: Sized,
    {
        Segments::new(self, false)
    }

    /// Iterate from the last segment to the first.
    fn segments_rev(&self) -> Segments<'_, Self>
    where
        Self: Sized,
    {
        Segments::new(self, true)
    }

    /// Count segments by full traversal.
    fn count_entries(&self) -> Result<usize>
    where
        Self: Sized,
    {
        let mut n = 0;
        for entry in self.segments() {
            entry?;
            n += 1;
        }
        Ok(n)
    }
}

enum State<E> {
    Start,
    At(E),
    Done,
}

/// Iterator over the entries of a [`SegmentDirectory`]
pub struct Segments<'a, D: SegmentDirectory> {
    directory: &'a D,
    state: State<D::Entry>,
    backward: bool,
}

impl<'a, D: SegmentDirectory> Segments<'a, D> {
    fn new(directory: &'a D, backward: bool) -> Self {
        Self {
            directory,
            state: State::Start,
            backward,
        }
    }
}

impl<D: SegmentDirectory> Iterator for Segments<'_, D> {
    type Item = Result<D::Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = match std::mem::replace(&mut self.state, State::Done) {
            State::Start if self.backward => self.directory.last_segment(),
            State::Start => self.directory.first_segment(),
            State::At(entry) if self.backward => self.directory.previous_segment(&entry),
            State::At(entry) => self.directory.next_segment(&entry),
            State::Done => return None,
        };
        match step {
            Ok(Some(entry)) => {
                self.state = State::At(entry.clone());
                Some(Ok(entry))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, KernelError};

    /// Directory over an in-memory list, entries are indices
    struct ListDirectory {
        len: usize,
        fail_at: Option<usize>,
    }

    impl SegmentDirectory for ListDirectory {
        type Entry = usize;

        fn first_segment(&self) -> Result<Option<usize>> {
            Ok((self.len > 0).then_some(0))
        }

        fn last_segment(&self) -> Result<Option<usize>> {
            Ok(self.len.checked_sub(1))
        }

        fn next_segment(&self, entry: &usize) -> Result<Option<usize>> {
            if Some(entry + 1) == self.fail_at {
                return Err(KernelError::new(ErrorKind::InvalidFormat, "bad pointer"));
            }
            Ok((entry + 1 < self.len).then_some(entry + 1))
        }

        fn previous_segment(&self, entry: &usize) -> Result<Option<usize>> {
            Ok(entry.checked_sub(1))
        }
    }

    #[test]
    fn test_forward_and_backward_iteration() {
        let dir = ListDirectory { len: 4, fail_at: None };
        let forward: Vec<usize> = dir.segments().map(|e| e.unwrap()).collect();
        assert_eq!(forward, vec![0, 1, 2, 3]);
        let backward: Vec<usize> = dir.segments_rev().map(|e| e.unwrap()).collect();
        assert_eq!(backward, vec![3, 2, 1, 0]);
        assert_eq!(dir.count_entries().unwrap(), 4);
    }

    #[test]
    fn test_empty_directory() {
        let dir = ListDirectory { len: 0, fail_at: None };
        assert_eq!(dir.segments().count(), 0);
        assert_eq!(dir.count_entries().unwrap(), 0);
    }

    #[test]
    fn test_error_stops_iteration() {
        let dir = ListDirectory { len: 5, fail_at: Some(2) };
        let items: Vec<_> = dir.segments().collect();
        assert_eq!(items.len(), 3);
        assert!(items[2].is_err());
        assert!(dir.count_entries().is_err());
    }
}
