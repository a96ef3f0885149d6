//! Variable-length adjacency lists stored in compressed row form.
//!
//! An [`Adjacency`] maps each item `i` to a list of entries. All lists are stored back to back
//! in a single data array, with an offsets array of length `len() + 1` delimiting them. This
//! lets meshes mix element geometries with differing node or face counts without padding.
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, Range};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency<T> {
    offsets: Vec<usize>,
    data: Vec<T>,
}

impl<T: Debug> Debug for Adjacency<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for Adjacency<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when raw offsets do not describe a valid adjacency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOffsets {
    message: &'static str,
}

impl Display for InvalidOffsets {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid adjacency offsets: {}", self.message)
    }
}

impl Error for InvalidOffsets {}

impl<T> Adjacency<T> {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            data: Vec::new(),
        }
    }

    /// Constructs an adjacency from raw compressed storage.
    ///
    /// The offsets must start at zero, be non-decreasing and end at `data.len()`.
    pub fn try_from_offsets_and_data(offsets: Vec<usize>, data: Vec<T>) -> Result<Self, InvalidOffsets> {
        match offsets.first() {
            Some(0) => {}
            Some(_) => return Err(InvalidOffsets { message: "first offset must be zero" }),
            None => return Err(InvalidOffsets { message: "offsets must not be empty" }),
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(InvalidOffsets {
                message: "offsets must be non-decreasing",
            });
        }
        if offsets.last() != Some(&data.len()) {
            return Err(InvalidOffsets {
                message: "last offset must equal the number of entries",
            });
        }
        Ok(Self { offsets, data })
    }

    /// Constructs an adjacency in which every list has the same length `width`.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero or does not divide the data length.
    pub fn from_uniform(width: usize, data: Vec<T>) -> Self {
        assert!(width > 0, "width must be positive");
        assert_eq!(data.len() % width, 0, "data length must be a multiple of width");
        let offsets = (0..=data.len() / width).map(|i| i * width).collect();
        Self { offsets, data }
    }

    /// Begin appending a new list entry by entry.
    ///
    /// The list is closed when the returned appender is dropped. The result is equivalent to
    /// adding the list at once with [`Adjacency::push`].
    pub fn begin_list(&mut self) -> ListAppender<'_, T> {
        let initial_count = self.data.len();
        ListAppender {
            initial_count,
            data: &mut self.data,
            offsets: &mut self.offsets,
        }
    }

    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &[T]> {
        self.offsets.windows(2).map(move |w| &self.data[w[0]..w[1]])
    }

    /// Number of lists.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the list at the given index.
    pub fn list_len(&self, index: usize) -> Option<usize> {
        self.index_range(index).map(|range| range.len())
    }

    /// Length of the longest list, or zero if there are no lists.
    pub fn max_list_len(&self) -> usize {
        self.offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Returns an iterator over all entries of all lists.
    pub fn iter_entries(&self) -> impl '_ + Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn total_num_entries(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        let range = self.index_range(index)?;
        self.data.get(range)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let range = self.index_range(index)?;
        self.data.get_mut(range)
    }

    fn index_range(&self, index: usize) -> Option<Range<usize>> {
        let begin = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        Some(begin..end)
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.offsets.truncate(1);
        self.data.clear();
    }
}

impl<T> Index<usize> for Adjacency<T> {
    type Output = [T];

    fn index(&self, index: usize) -> &[T] {
        let begin = self.offsets[index];
        let end = self.offsets[index + 1];
        &self.data[begin..end]
    }
}

#[derive(Debug)]
pub struct ListAppender<'a, T> {
    data: &'a mut Vec<T>,
    offsets: &'a mut Vec<usize>,
    initial_count: usize,
}

impl<'a, T> ListAppender<'a, T> {
    pub fn push_single(&mut self, entry: T) -> &mut Self {
        self.data.push(entry);
        self
    }

    pub fn count(&self) -> usize {
        self.data.len() - self.initial_count
    }
}

impl<'a, T> Extend<T> for ListAppender<'a, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.data.extend(iter);
    }
}

impl<'a, T> Drop for ListAppender<'a, T> {
    fn drop(&mut self) {
        self.offsets.push(self.data.len());
    }
}

impl<T: Clone> Adjacency<T> {
    pub fn push(&mut self, list: &[T]) {
        self.data.extend_from_slice(list);
        self.offsets.push(self.data.len());
    }
}

impl<'a, T: Clone> From<&'a Vec<Vec<T>>> for Adjacency<T> {
    fn from(nested: &'a Vec<Vec<T>>) -> Self {
        let mut result = Self::new();
        for list in nested {
            result.push(list);
        }
        result
    }
}

impl<T: Clone> From<Vec<Vec<T>>> for Adjacency<T> {
    fn from(nested: Vec<Vec<T>>) -> Self {
        Self::from(&nested)
    }
}

impl<'a, T: Clone> From<&'a Adjacency<T>> for Vec<Vec<T>> {
    fn from(adjacency: &'a Adjacency<T>) -> Self {
        adjacency.iter().map(|list| list.to_vec()).collect()
    }
}

impl<T: Clone> From<Adjacency<T>> for Vec<Vec<T>> {
    fn from(adjacency: Adjacency<T>) -> Self {
        Self::from(&adjacency)
    }
}
