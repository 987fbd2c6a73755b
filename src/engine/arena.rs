//! Call-scoped stream storage.
//!
//! Every runtime stream of one compression call lives here, addressed by its
//! index. Caller inputs are borrowed; everything a transform produces is owned.
//! Speculative work is undone by truncating back to a previous length.

use crate::error::{Result, TambakError};
use crate::types::{StreamView, TypedBuffer};

#[derive(Debug)]
enum Slot<'a> {
    Input(StreamView<'a>),
    Owned(TypedBuffer),
}

#[derive(Debug)]
pub(crate) struct Arena<'a> {
    slots: Vec<Slot<'a>>,
    owned_bytes: usize,
    limit: usize,
}

impl<'a> Arena<'a> {
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            owned_bytes: 0,
            limit,
        }
    }

    pub fn push_input(&mut self, view: StreamView<'a>) -> usize {
        self.slots.push(Slot::Input(view));
        self.slots.len() - 1
    }

    /// Takes ownership of a produced stream. Fails once the owned bytes of the
    /// call would exceed the limit.
    pub fn push_owned(&mut self, buf: TypedBuffer) -> Result<usize> {
        let size = buf.memory_size();
        let total = self.owned_bytes.saturating_add(size);
        if total > self.limit {
            return Err(TambakError::allocation(format!(
                "stream of {} bytes would bring the call to {} bytes, limit is {}",
                size, total, self.limit
            )));
        }
        self.owned_bytes = total;
        self.slots.push(Slot::Owned(buf));
        Ok(self.slots.len() - 1)
    }

    pub fn view(&self, id: usize) -> Result<StreamView<'_>> {
        match self.slots.get(id) {
            Some(Slot::Input(v)) => Ok(*v),
            Some(Slot::Owned(b)) => Ok(b.view()),
            None => Err(TambakError::logic(format!("stream {} does not exist", id))),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn owned_bytes(&self) -> usize {
        self.owned_bytes
    }

    /// Drops every stream created after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        for slot in self.slots.drain(len.min(self.slots.len())..) {
            if let Slot::Owned(b) = slot {
                self.owned_bytes -= b.memory_size();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_limit_counts_owned_bytes_only() {
        let big = vec![0u8; 64];
        let mut arena = Arena::new(16);
        arena.push_input(StreamView::serial(&big));
        arena.push_owned(TypedBuffer::serial(vec![1; 10])).unwrap();
        let err = arena.push_owned(TypedBuffer::serial(vec![2; 7])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Allocation);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_truncate_releases_bytes() {
        let mut arena = Arena::new(usize::MAX);
        arena.push_owned(TypedBuffer::serial(vec![0; 4])).unwrap();
        arena.push_owned(TypedBuffer::serial(vec![0; 6])).unwrap();
        arena.truncate(1);
        assert_eq!(arena.owned_bytes(), 4);
        assert_eq!(arena.view(0).unwrap().content_size(), 4);
        assert!(arena.view(1).is_err());
    }
}
