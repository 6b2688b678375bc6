use crate::assembly::local::{LocalMatrix, LocalVector};
use crate::error::FaultError;
use crate::field::{Field, Section};
use crate::Real;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use std::ops::Range;

/// Maps mesh points to the global degrees of freedom of a solution layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    section: Section,
}

impl DofMap {
    pub fn from_section(section: &Section) -> Result<Self, FaultError> {
        if !section.is_setup() {
            return Err(FaultError::invariant("cannot build a dof map from a section that is not set up"));
        }
        Ok(Self {
            section: section.clone(),
        })
    }

    pub fn from_field<T: Real>(field: &Field<T>) -> Result<Self, FaultError> {
        Self::from_section(field.section())
    }

    pub fn num_dofs(&self) -> usize {
        self.section.storage_size()
    }

    pub fn dofs(&self, point: usize) -> Result<Range<usize>, FaultError> {
        let offset = self.section.offset(point)?;
        Ok(offset..offset + self.section.fiber_dimension(point)?)
    }

    /// Global dofs of a list of points, in order.
    pub fn collect_dofs(&self, points: &[usize], dofs: &mut Vec<usize>) -> Result<(), FaultError> {
        dofs.clear();
        for &point in points {
            dofs.extend(self.dofs(point)?);
        }
        Ok(())
    }
}

/// A global sparse Jacobian accumulated from local blocks.
#[derive(Debug, Clone)]
pub struct SparseJacobian<T: Real> {
    dof_map: DofMap,
    coo: CooMatrix<T>,
}

impl<T: Real> SparseJacobian<T> {
    pub fn new(dof_map: DofMap) -> Self {
        let n = dof_map.num_dofs();
        Self {
            dof_map,
            coo: CooMatrix::new(n, n),
        }
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn num_dofs(&self) -> usize {
        self.dof_map.num_dofs()
    }

    /// Removes all accumulated entries.
    pub fn zero(&mut self) {
        let n = self.num_dofs();
        self.coo = CooMatrix::new(n, n);
    }

    /// Adds a local block. The block is validated against the dof map before any entry is
    /// pushed.
    pub fn add_local(&mut self, local: &LocalMatrix<T>) -> Result<(), FaultError> {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        self.dof_map.collect_dofs(&local.row_points, &mut rows)?;
        self.dof_map.collect_dofs(&local.col_points, &mut cols)?;
        if rows.len() != local.values.nrows() || cols.len() != local.values.ncols() {
            return Err(FaultError::invariant(format!(
                "local matrix of size {}x{} does not match {} row dofs and {} column dofs",
                local.values.nrows(),
                local.values.ncols(),
                rows.len(),
                cols.len()
            )));
        }
        for (j, &col) in cols.iter().enumerate() {
            for (i, &row) in rows.iter().enumerate() {
                let value = local.values[(i, j)];
                if value != T::zero() {
                    self.coo.push(row, col, value);
                }
            }
        }
        Ok(())
    }

    pub fn coo(&self) -> &CooMatrix<T> {
        &self.coo
    }

    /// Sums duplicate entries into a CSR matrix.
    pub fn to_csr(&self) -> CsrMatrix<T> {
        CsrMatrix::from(&self.coo)
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        DMatrix::from(&self.coo)
    }
}

/// Computes local residual contributions in parallel and adds them to the residual.
///
/// Either every contribution is added or, if any item fails, none is.
pub fn assemble_residual_par<T, I, F>(residual: &mut Field<T>, items: &[I], local: F) -> Result<(), FaultError>
where
    T: Real,
    I: Sync,
    F: Fn(&I) -> Result<LocalVector<T>, FaultError> + Sync,
{
    let contributions = items
        .par_iter()
        .map(|item| local(item))
        .collect::<Result<Vec<_>, _>>()?;
    let mut assembled = residual.clone_layout(residual.label().to_string());
    for contribution in &contributions {
        contribution.assemble_into(&mut assembled)?;
    }
    *residual.values_mut() += assembled.values();
    Ok(())
}

/// Computes local Jacobian blocks in parallel and adds them to the Jacobian.
pub fn assemble_jacobian_par<T, I, F>(jacobian: &mut SparseJacobian<T>, items: &[I], local: F) -> Result<(), FaultError>
where
    T: Real,
    I: Sync,
    F: Fn(&I) -> Result<LocalMatrix<T>, FaultError> + Sync,
{
    let blocks = items
        .par_iter()
        .map(|item| local(item))
        .collect::<Result<Vec<_>, _>>()?;
    let mut staged = SparseJacobian::new(jacobian.dof_map.clone());
    for block in &blocks {
        staged.add_local(block)?;
    }
    for (row, col, value) in staged.coo.triplet_iter() {
        jacobian.coo.push(row, col, *value);
    }
    Ok(())
}
