//! Construction of auxiliary fields from spatial databases.
//!
//! An [`AuxiliaryFactory`] collects subfields in declaration order, each with a
//! [`SubfieldQuery`] describing which database values it is made of. [`AuxiliaryFactory::query_db`]
//! then creates the field, queries every point (or every cell, for basis order 0) and
//! non-dimensionalizes the result.
use crate::error::FaultError;
use crate::field::{Discretization, Field, SubfieldInfo};
use crate::topology::PointRange;
use crate::Real;
use log::debug;
use nalgebra::{convert, try_convert};
use rustc_hash::FxHashMap;
use rupture_spatialdata::geocoords::CoordSys;
use rupture_spatialdata::nondimensional::Nondimensionalizer;
use rupture_spatialdata::spatialdb::SpatialDatabase;
use std::fmt;
use std::sync::Arc;

/// Converts raw database values (in the order of the query names) into subfield values.
pub type ConversionFn = Arc<dyn Fn(&[f64]) -> Result<Vec<f64>, String> + Send + Sync>;

/// The database values that make up a subfield.
#[derive(Clone)]
pub struct SubfieldQuery {
    names: Vec<String>,
    conversion: Option<ConversionFn>,
}

impl fmt::Debug for SubfieldQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubfieldQuery")
            .field("names", &self.names)
            .field("conversion", &self.conversion.is_some())
            .finish()
    }
}

impl SubfieldQuery {
    /// Queries the given values and uses them unchanged, one per component.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            conversion: None,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new([name.into()])
    }

    pub fn with_conversion<F>(mut self, conversion: F) -> Self
    where
        F: Fn(&[f64]) -> Result<Vec<f64>, String> + Send + Sync + 'static,
    {
        self.conversion = Some(Arc::new(conversion));
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn convert(&self, values: &[f64]) -> Result<Vec<f64>, String> {
        match &self.conversion {
            Some(conversion) => conversion(values),
            None => Ok(values.to_vec()),
        }
    }
}

/// A point at which auxiliary values are stored, with its non-dimensional coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPoint<T> {
    pub point: usize,
    pub coordinates: Vec<T>,
}

/// A cell of the auxiliary points. Cell-wise subfields (basis order 0) are queried at
/// `coordinates` and every point gets the mean over the cells it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCell<T> {
    pub cell: usize,
    pub coordinates: Vec<T>,
    pub points: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct AuxiliaryFactory<T> {
    label: String,
    points: Vec<QueryPoint<T>>,
    cells: Vec<QueryCell<T>>,
    subfields: Vec<(SubfieldInfo, SubfieldQuery)>,
}

impl<T: Real> AuxiliaryFactory<T> {
    pub fn new(label: impl Into<String>, points: Vec<QueryPoint<T>>) -> Self {
        Self {
            label: label.into(),
            points,
            cells: Vec::new(),
            subfields: Vec::new(),
        }
    }

    /// Sets the cells used by subfields with basis order 0.
    pub fn with_cells(mut self, cells: Vec<QueryCell<T>>) -> Self {
        self.cells = cells;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[QueryPoint<T>] {
        &self.points
    }

    pub fn cells(&self) -> &[QueryCell<T>] {
        &self.cells
    }

    /// Appends a subfield. Subfields keep the order in which they are added.
    pub fn add_subfield(&mut self, info: SubfieldInfo, query: SubfieldQuery) -> Result<(), FaultError> {
        if self.subfields.iter().any(|(existing, _)| existing.name == info.name) {
            return Err(FaultError::configuration(format!(
                "subfield '{}' declared twice in auxiliary field '{}'",
                info.name, self.label
            )));
        }
        self.subfields.push((info, query));
        Ok(())
    }

    pub fn subfield_names(&self) -> Vec<&str> {
        self.subfields.iter().map(|(info, _)| info.name.as_str()).collect()
    }

    pub fn subfield_info(&self) -> impl Iterator<Item = &SubfieldInfo> {
        self.subfields.iter().map(|(info, _)| info)
    }

    pub fn set_discretization(&mut self, name: &str, discretization: Discretization) -> Result<(), FaultError> {
        let (info, _) = self
            .subfields
            .iter_mut()
            .find(|(info, _)| info.name == name)
            .ok_or_else(|| {
                FaultError::configuration(format!("auxiliary field '{}' has no subfield '{}'", self.label, name))
            })?;
        info.discretization = discretization;
        Ok(())
    }

    /// Builds the auxiliary field by querying the database.
    ///
    /// Subfields with basis order 1 are queried at every point. Subfields with basis order 0
    /// are queried at the cell coordinates and averaged over the cells adjacent to each point.
    /// Coordinates are dimensionalized with the length scale and converted to meters with
    /// `coordsys` before the query. Values are non-dimensionalized with their subfield scale.
    pub fn query_db(
        &self,
        db: &dyn SpatialDatabase,
        coordsys: &CoordSys,
        normalizer: &Nondimensionalizer,
    ) -> Result<Field<T>, FaultError> {
        let chart = match (self.points.iter().map(|p| p.point).min(), self.points.iter().map(|p| p.point).max()) {
            (Some(min), Some(max)) => PointRange::try_new(min, max + 1)?,
            _ => PointRange::new(0, 0),
        };
        let infos = self.subfields.iter().map(|(info, _)| info.clone()).collect();
        let mut field = Field::new(self.label.clone(), chart, infos);
        field.set_full_fibers(self.points.iter().map(|p| p.point))?;
        field.allocate();

        for (subfield, (info, query)) in self.subfields.iter().enumerate() {
            match info.discretization.basis_order {
                1 => {
                    for query_point in &self.points {
                        let location = format!("point {}", query_point.point);
                        let values =
                            self.query_values(db, coordsys, normalizer, info, query, &location, &query_point.coordinates)?;
                        field.update_subfield(query_point.point, subfield, &values)?;
                    }
                }
                0 => self.query_cellwise(&mut field, subfield, db, coordsys, normalizer)?,
                order => {
                    return Err(FaultError::not_implemented(format!(
                        "basis order {} for subfield '{}' of '{}'",
                        order, info.name, self.label
                    )))
                }
            }
        }
        debug!(
            "Queried {} subfields of '{}' at {} points and {} cells from '{}'",
            self.subfields.len(),
            self.label,
            self.points.len(),
            self.cells.len(),
            db.label()
        );
        Ok(field)
    }

    fn query_cellwise(
        &self,
        field: &mut Field<T>,
        subfield: usize,
        db: &dyn SpatialDatabase,
        coordsys: &CoordSys,
        normalizer: &Nondimensionalizer,
    ) -> Result<(), FaultError> {
        let (info, query) = &self.subfields[subfield];
        let mut sums: FxHashMap<usize, (Vec<T>, usize)> = FxHashMap::default();
        for cell in &self.cells {
            let location = format!("cell {}", cell.cell);
            let values = self.query_values(db, coordsys, normalizer, info, query, &location, &cell.coordinates)?;
            for &point in &cell.points {
                let (sum, count) = sums
                    .entry(point)
                    .or_insert_with(|| (vec![T::zero(); values.len()], 0));
                for (s, &v) in sum.iter_mut().zip(&values) {
                    *s += v;
                }
                *count += 1;
            }
        }
        for query_point in &self.points {
            let (sum, count) = sums.get(&query_point.point).ok_or_else(|| {
                FaultError::configuration(format!(
                    "point {} of '{}' belongs to no cell, needed by cell-wise subfield '{}'",
                    query_point.point, self.label, info.name
                ))
            })?;
            let count: T = convert(*count as f64);
            let mean: Vec<T> = sum.iter().map(|&s| s / count).collect();
            field.update_subfield(query_point.point, subfield, &mean)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn query_values(
        &self,
        db: &dyn SpatialDatabase,
        coordsys: &CoordSys,
        normalizer: &Nondimensionalizer,
        info: &SubfieldInfo,
        query: &SubfieldQuery,
        location: &str,
        coordinates: &[T],
    ) -> Result<Vec<T>, FaultError> {
        let mut xyz = Vec::with_capacity(coordinates.len());
        for &x in coordinates {
            let x: f64 = try_convert(x).ok_or_else(|| FaultError::invariant("coordinate does not fit in f64"))?;
            xyz.push(normalizer.dimensionalize(x, normalizer.length_scale()));
        }
        coordsys.convert_to_meters(&mut xyz);

        let names: Vec<&str> = query.names.iter().map(String::as_str).collect();
        let mut raw = vec![0.0; names.len()];
        db.query(&mut raw, &names, &xyz).map_err(|err| {
            FaultError::configuration(format!(
                "could not find values {:?} for subfield '{}' of '{}' at {} ({:?}) in spatial database '{}': {}",
                names,
                info.name,
                self.label,
                location,
                xyz,
                db.label(),
                err
            ))
        })?;
        let values = query.convert(&raw).map_err(|message| {
            FaultError::configuration(format!(
                "invalid value for subfield '{}' of '{}' at {} ({:?}): {}",
                info.name, self.label, location, xyz, message
            ))
        })?;
        if values.len() != info.num_components() {
            return Err(FaultError::invariant(format!(
                "conversion of subfield '{}' produced {} values for {} components",
                info.name,
                values.len(),
                info.num_components()
            )));
        }
        Ok(values
            .iter()
            .map(|&v| convert(normalizer.nondimensionalize(v, info.scale)))
            .collect())
    }
}
