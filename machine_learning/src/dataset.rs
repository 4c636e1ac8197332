use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset, one sample per row.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The features, one sample per row.
    /// * `y` - The labels, one sample per row.
    ///
    /// # Returns
    /// An error if the amount of rows differ or if there are no samples.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::DataMismatch {
                x_rows: x.nrows(),
                y_rows: y.nrows(),
            });
        }

        if x.nrows() == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(Self { x, y })
    }

    /// Creates a new `Dataset` from a flat buffer where every row holds `x_size` features
    /// followed by `y_size` labels.
    ///
    /// # Arguments
    /// * `data` - The flat buffer.
    /// * `x_size` - The amount of features per row.
    /// * `y_size` - The amount of labels per row.
    pub fn from_flat(data: &[f32], x_size: usize, y_size: usize) -> Result<Self> {
        let row_size = x_size + y_size;

        if row_size == 0 || data.len() % row_size != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: data.len().next_multiple_of(row_size.max(1)),
            });
        }

        let rows = data.len() / row_size;
        let full = ArrayView2::from_shape((rows, row_size), data).map_err(|_| {
            MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: rows * row_size,
            }
        })?;

        let x = full.slice(s![.., ..x_size]).to_owned();
        let y = full.slice(s![.., x_size..]).to_owned();
        Self::new(x, y)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    /// Shuffles the rows of the dataset, keeping every feature row next to its label row.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }

    /// Returns an iterator over owned `(x, y)` batches of at most `batch_size` rows, taken in
    /// the order given by `order`. The stored rows are left untouched.
    ///
    /// # Arguments
    /// * `order` - A permutation of the row indices.
    /// * `batch_size` - The maximum amount of rows per batch.
    pub fn batches_in<'a>(
        &'a self,
        order: &'a [usize],
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (Array2<f32>, Array2<f32>)> + 'a {
        order.chunks(batch_size.get()).map(|rows| {
            (
                self.x.select(Axis(0), rows),
                self.y.select(Axis(0), rows),
            )
        })
    }

    /// Takes the rows in `rows` into a new dataset.
    pub fn select(&self, rows: &[usize]) -> Result<Self> {
        Self::new(self.x.select(Axis(0), rows), self.y.select(Axis(0), rows))
    }
}
