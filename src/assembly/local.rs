use crate::error::FaultError;
use crate::field::Field;
use crate::Real;
use nalgebra::DMatrix;

/// A dense residual contribution over a list of points.
///
/// `values` holds the values of every point in turn, each as many as the fiber dimension of
/// the point in the target field.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVector<T: Real> {
    pub points: Vec<usize>,
    pub values: Vec<T>,
}

impl<T: Real> LocalVector<T> {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends the values of a point.
    pub fn push(&mut self, point: usize, values: &[T]) {
        self.points.push(point);
        self.values.extend_from_slice(values);
    }

    /// Adds the contribution to the target field.
    ///
    /// The contribution is checked against the layout of the field before anything is added, so a
    /// failure leaves the field untouched.
    pub fn assemble_into(&self, field: &mut Field<T>) -> Result<(), FaultError> {
        let mut expected = 0;
        for &point in &self.points {
            expected += field.section().fiber_dimension(point)?;
        }
        if expected != self.values.len() {
            return Err(FaultError::invariant(format!(
                "local vector over points {:?} has {} values, the field layout needs {}",
                self.points,
                self.values.len(),
                expected
            )));
        }
        let mut offset = 0;
        for &point in &self.points {
            let n = field.section().fiber_dimension(point)?;
            field.add_to_point(point, &self.values[offset..offset + n])?;
            offset += n;
        }
        Ok(())
    }
}

impl<T: Real> Default for LocalVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A dense Jacobian block over row and column points.
///
/// Rows and columns are ordered like the values of [`LocalVector`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatrix<T: Real> {
    pub row_points: Vec<usize>,
    pub col_points: Vec<usize>,
    pub values: DMatrix<T>,
}

impl<T: Real> LocalMatrix<T> {
    pub fn zeros(row_points: Vec<usize>, col_points: Vec<usize>, nrows: usize, ncols: usize) -> Self {
        Self {
            row_points,
            col_points,
            values: DMatrix::zeros(nrows, ncols),
        }
    }
}
