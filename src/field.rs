//! Point-indexed fields with named subfields.
//!
//! A [`Section`] lays out degrees of freedom over a chart of mesh points: each point carries a
//! number of values (its fiber dimension) for every subfield, stored point-major. A [`Field`]
//! couples a section with a value vector and the metadata of its subfields.
use crate::error::FaultError;
use crate::topology::PointRange;
use crate::Real;
use nalgebra::{convert, DVector};
use serde::{Deserialize, Serialize};

/// Discretization of a subfield.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Discretization {
    pub basis_order: usize,
    pub quadrature_order: usize,
    pub continuous: bool,
}

impl Default for Discretization {
    fn default() -> Self {
        Self {
            basis_order: 1,
            quadrature_order: 1,
            continuous: true,
        }
    }
}

impl Discretization {
    pub fn new(basis_order: usize, quadrature_order: usize, continuous: bool) -> Self {
        Self {
            basis_order,
            quadrature_order,
            continuous,
        }
    }
}

/// Metadata of a subfield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubfieldInfo {
    pub name: String,
    pub components: Vec<String>,
    /// Physical scale used for non-dimensionalization.
    pub scale: f64,
    pub discretization: Discretization,
}

impl SubfieldInfo {
    pub fn new(name: impl Into<String>, components: Vec<String>, scale: f64) -> Self {
        Self {
            name: name.into(),
            components,
            scale,
            discretization: Discretization::default(),
        }
    }

    /// A single-component subfield whose component carries the subfield name.
    pub fn scalar(name: impl Into<String>, scale: f64) -> Self {
        let name = name.into();
        Self::new(name.clone(), vec![name], scale)
    }

    pub fn with_discretization(mut self, discretization: Discretization) -> Self {
        self.discretization = discretization;
        self
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }
}

/// Layout of values over a chart of points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    chart: PointRange,
    num_subfields: usize,
    /// Fiber dimension per chart point and subfield, indexed `[point - start][subfield]`.
    fibers: Vec<Vec<usize>>,
    /// Offset of each chart point, plus one trailing entry. Empty until set up.
    offsets: Vec<usize>,
}

impl Section {
    pub fn new(chart: PointRange, num_subfields: usize) -> Self {
        Self {
            chart,
            num_subfields,
            fibers: vec![vec![0; num_subfields]; chart.len()],
            offsets: Vec::new(),
        }
    }

    pub fn chart(&self) -> PointRange {
        self.chart
    }

    pub fn num_subfields(&self) -> usize {
        self.num_subfields
    }

    pub fn is_setup(&self) -> bool {
        !self.offsets.is_empty()
    }

    fn local_index(&self, point: usize) -> Result<usize, FaultError> {
        if self.chart.contains(point) {
            Ok(point - self.chart.start())
        } else {
            Err(FaultError::invariant(format!(
                "point {} outside the section chart [{}, {})",
                point,
                self.chart.start(),
                self.chart.end()
            )))
        }
    }

    fn check_subfield(&self, subfield: usize) -> Result<(), FaultError> {
        if subfield < self.num_subfields {
            Ok(())
        } else {
            Err(FaultError::invariant(format!(
                "subfield {} out of bounds for a section with {} subfields",
                subfield, self.num_subfields
            )))
        }
    }

    pub fn set_subfield_fiber_dimension(&mut self, point: usize, subfield: usize, dim: usize) -> Result<(), FaultError> {
        if self.is_setup() {
            return Err(FaultError::invariant("cannot change fiber dimensions after section setup"));
        }
        self.check_subfield(subfield)?;
        let idx = self.local_index(point)?;
        self.fibers[idx][subfield] = dim;
        Ok(())
    }

    /// Computes the offsets of all points. Subsequent calls are no-ops.
    pub fn setup(&mut self) {
        if self.is_setup() {
            return;
        }
        let mut offsets = Vec::with_capacity(self.fibers.len() + 1);
        let mut offset = 0;
        offsets.push(0);
        for fiber in &self.fibers {
            offset += fiber.iter().sum::<usize>();
            offsets.push(offset);
        }
        self.offsets = offsets;
    }

    fn require_setup(&self) -> Result<(), FaultError> {
        if self.is_setup() {
            Ok(())
        } else {
            Err(FaultError::invariant("section used before setup"))
        }
    }

    pub fn fiber_dimension(&self, point: usize) -> Result<usize, FaultError> {
        let idx = self.local_index(point)?;
        Ok(self.fibers[idx].iter().sum())
    }

    pub fn subfield_fiber_dimension(&self, point: usize, subfield: usize) -> Result<usize, FaultError> {
        self.check_subfield(subfield)?;
        let idx = self.local_index(point)?;
        Ok(self.fibers[idx][subfield])
    }

    pub fn offset(&self, point: usize) -> Result<usize, FaultError> {
        self.require_setup()?;
        let idx = self.local_index(point)?;
        Ok(self.offsets[idx])
    }

    pub fn subfield_offset(&self, point: usize, subfield: usize) -> Result<usize, FaultError> {
        self.require_setup()?;
        self.check_subfield(subfield)?;
        let idx = self.local_index(point)?;
        Ok(self.offsets[idx] + self.fibers[idx][..subfield].iter().sum::<usize>())
    }

    /// Total number of values. Zero before setup.
    pub fn storage_size(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Chart points with a nonzero fiber dimension, in increasing order.
    pub fn points(&self) -> impl Iterator<Item = usize> + '_ {
        self.chart
            .iter()
            .zip(&self.fibers)
            .filter(|(_, fiber)| fiber.iter().any(|&n| n > 0))
            .map(|(point, _)| point)
    }

    /// Chart points with values in the given subfield.
    pub fn subfield_points(&self, subfield: usize) -> impl Iterator<Item = usize> + '_ {
        self.chart
            .iter()
            .zip(&self.fibers)
            .filter(move |(_, fiber)| fiber.get(subfield).map_or(false, |&n| n > 0))
            .map(|(point, _)| point)
    }
}

/// A named field over mesh points.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<T: Real> {
    label: String,
    subfields: Vec<SubfieldInfo>,
    section: Section,
    values: DVector<T>,
}

impl<T: Real> Field<T> {
    /// Creates an unallocated field over the given chart with the given subfields.
    pub fn new(label: impl Into<String>, chart: PointRange, subfields: Vec<SubfieldInfo>) -> Self {
        let section = Section::new(chart, subfields.len());
        Self {
            label: label.into(),
            subfields,
            section,
            values: DVector::zeros(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn subfields(&self) -> &[SubfieldInfo] {
        &self.subfields
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn is_allocated(&self) -> bool {
        self.section.is_setup()
    }

    pub fn subfield_index(&self, name: &str) -> Option<usize> {
        self.subfields.iter().position(|info| info.name == name)
    }

    /// Like [`Field::subfield_index`], but a missing subfield is a configuration error.
    pub fn require_subfield(&self, name: &str) -> Result<usize, FaultError> {
        self.subfield_index(name).ok_or_else(|| {
            FaultError::configuration(format!("field '{}' has no subfield '{}'", self.label, name))
        })
    }

    /// Sets the fiber dimension of a point in a field with a single subfield.
    pub fn set_fiber_dimension(&mut self, point: usize, dim: usize) -> Result<(), FaultError> {
        if self.subfields.len() != 1 {
            return Err(FaultError::invariant(format!(
                "field '{}' has {} subfields, set the fiber dimension per subfield",
                self.label,
                self.subfields.len()
            )));
        }
        self.section.set_subfield_fiber_dimension(point, 0, dim)
    }

    pub fn set_subfield_fiber_dimension(&mut self, point: usize, subfield: usize, dim: usize) -> Result<(), FaultError> {
        self.section.set_subfield_fiber_dimension(point, subfield, dim)
    }

    /// Gives every point in `points` the full component count of every subfield.
    pub fn set_full_fibers(&mut self, points: impl IntoIterator<Item = usize>) -> Result<(), FaultError> {
        for point in points {
            for (idx, info) in self.subfields.iter().enumerate() {
                self.section
                    .set_subfield_fiber_dimension(point, idx, info.num_components())?;
            }
        }
        Ok(())
    }

    /// Sets up the section and allocates zeroed storage.
    pub fn allocate(&mut self) {
        self.section.setup();
        self.values = DVector::zeros(self.section.storage_size());
    }

    fn require_allocated(&self) -> Result<(), FaultError> {
        if self.is_allocated() {
            Ok(())
        } else {
            Err(FaultError::invariant(format!("field '{}' used before allocation", self.label)))
        }
    }

    fn point_range(&self, point: usize) -> Result<std::ops::Range<usize>, FaultError> {
        self.require_allocated()?;
        let offset = self.section.offset(point)?;
        Ok(offset..offset + self.section.fiber_dimension(point)?)
    }

    fn subfield_range(&self, point: usize, subfield: usize) -> Result<std::ops::Range<usize>, FaultError> {
        self.require_allocated()?;
        let offset = self.section.subfield_offset(point, subfield)?;
        Ok(offset..offset + self.section.subfield_fiber_dimension(point, subfield)?)
    }

    pub fn restrict_point(&self, point: usize) -> Result<&[T], FaultError> {
        let range = self.point_range(point)?;
        Ok(&self.values.as_slice()[range])
    }

    pub fn restrict_subfield(&self, point: usize, subfield: usize) -> Result<&[T], FaultError> {
        let range = self.subfield_range(point, subfield)?;
        Ok(&self.values.as_slice()[range])
    }

    pub fn update_point(&mut self, point: usize, values: &[T]) -> Result<(), FaultError> {
        let range = self.point_range(point)?;
        check_len(&self.label, point, range.len(), values.len())?;
        self.values.as_mut_slice()[range].copy_from_slice(values);
        Ok(())
    }

    pub fn update_subfield(&mut self, point: usize, subfield: usize, values: &[T]) -> Result<(), FaultError> {
        let range = self.subfield_range(point, subfield)?;
        check_len(&self.label, point, range.len(), values.len())?;
        self.values.as_mut_slice()[range].copy_from_slice(values);
        Ok(())
    }

    /// Adds values to a point instead of overwriting them.
    pub fn add_to_point(&mut self, point: usize, values: &[T]) -> Result<(), FaultError> {
        let range = self.point_range(point)?;
        check_len(&self.label, point, range.len(), values.len())?;
        for (target, value) in self.values.as_mut_slice()[range].iter_mut().zip(values) {
            *target += *value;
        }
        Ok(())
    }

    pub fn zero(&mut self) {
        self.values.fill(T::zero());
    }

    /// A zeroed field with the same subfields and layout.
    pub fn clone_layout(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            subfields: self.subfields.clone(),
            section: self.section.clone(),
            values: DVector::zeros(self.values.len()),
        }
    }

    /// Points with values, in increasing order.
    pub fn points(&self) -> impl Iterator<Item = usize> + '_ {
        self.section.points()
    }

    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<T> {
        &mut self.values
    }

    /// Multiplies every subfield by its scale.
    pub fn dimensionalize(&mut self) -> Result<(), FaultError> {
        self.scale_subfields(|scale| scale)
    }

    /// Divides every subfield by its scale.
    pub fn nondimensionalize(&mut self) -> Result<(), FaultError> {
        self.scale_subfields(|scale| T::one() / scale)
    }

    fn scale_subfields(&mut self, factor: impl Fn(T) -> T) -> Result<(), FaultError> {
        self.require_allocated()?;
        let points: Vec<_> = self.points().collect();
        for (subfield, info) in self.subfields.iter().enumerate() {
            let subfield_factor = factor(convert(info.scale));
            for &point in &points {
                let range = self.subfield_range(point, subfield)?;
                for value in &mut self.values.as_mut_slice()[range] {
                    *value *= subfield_factor;
                }
            }
        }
        Ok(())
    }
}

fn check_len(label: &str, point: usize, expected: usize, actual: usize) -> Result<(), FaultError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FaultError::invariant(format!(
            "field '{}' has {} values at point {}, got {}",
            label, expected, point, actual
        )))
    }
}
