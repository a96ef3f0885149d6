use crate::error::AssemblyError;
use crate::Real;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix, SparseEntryMut};

/// A global matrix that assembly adds entries into.
pub trait MatrixDestination<T> {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    /// Adds `value` to the entry at `(row, col)`.
    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()>;
}

impl<T: Real> MatrixDestination<T> for DMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }

    fn ncols(&self) -> usize {
        self.ncols()
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        self[(row, col)] += value;
        Ok(())
    }
}

/// Entries are pushed as triplets, so duplicates are summed when converting to a compressed
/// format.
impl<T: Real> MatrixDestination<T> for CooMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }

    fn ncols(&self) -> usize {
        self.ncols()
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        self.push(row, col, value);
        Ok(())
    }
}

/// The sparsity pattern of the matrix must contain every entry touched by the assembly.
impl<T: Real> MatrixDestination<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }

    fn ncols(&self) -> usize {
        self.ncols()
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        match self.get_entry_mut(row, col) {
            Some(SparseEntryMut::NonZero(entry)) => {
                *entry += value;
                Ok(())
            }
            _ => Err(AssemblyError::MissingMatrixEntry { row, col }.into()),
        }
    }
}

impl<'d, T, D: MatrixDestination<T> + ?Sized> MatrixDestination<T> for &'d mut D {
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        (**self).add_entry(row, col, value)
    }
}

/// A rectangular block of a larger matrix, e.g. the coupling block of a saddle point system.
#[derive(Debug)]
pub struct MatrixBlock<'d, D: ?Sized> {
    matrix: &'d mut D,
    row_offset: usize,
    col_offset: usize,
    nrows: usize,
    ncols: usize,
}

impl<'d, D: ?Sized> MatrixBlock<'d, D> {
    /// The block of `matrix` with the given size whose first entry is at
    /// `(row_offset, col_offset)`.
    pub fn new(matrix: &'d mut D, row_offset: usize, col_offset: usize, nrows: usize, ncols: usize) -> Self {
        Self {
            matrix,
            row_offset,
            col_offset,
            nrows,
            ncols,
        }
    }
}

impl<'d, T, D: MatrixDestination<T> + ?Sized> MatrixDestination<T> for MatrixBlock<'d, D> {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn add_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        self.matrix
            .add_entry(self.row_offset + row, self.col_offset + col, value)
    }
}
