//! Spatial databases: named physical values as functions of position.
//!
//! All points passed to [`SpatialDatabase::query`] are in meters, and all returned values are
//! in SI units.
use crate::error::QueryError;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

mod simple;

pub use simple::SimpleDb;

/// Read-only access to named values at points in space.
pub trait SpatialDatabase: Send + Sync {
    fn label(&self) -> &str;

    fn value_names(&self) -> Vec<String>;

    fn has_value(&self, name: &str) -> bool {
        self.value_names().iter().any(|n| n == name)
    }

    /// Writes the values named by `names` at `point` into `values`.
    ///
    /// Fails with [`QueryError::NotFound`] if the point lies outside the domain of support.
    fn query(&self, values: &mut [f64], names: &[&str], point: &[f64]) -> Result<(), QueryError>;
}

impl<D: SpatialDatabase + ?Sized> SpatialDatabase for Arc<D> {
    fn label(&self) -> &str {
        D::label(self)
    }

    fn value_names(&self) -> Vec<String> {
        D::value_names(self)
    }

    fn has_value(&self, name: &str) -> bool {
        D::has_value(self, name)
    }

    fn query(&self, values: &mut [f64], names: &[&str], point: &[f64]) -> Result<(), QueryError> {
        D::query(self, values, names, point)
    }
}

fn check_output_len(values: &[f64], names: &[&str]) -> Result<(), QueryError> {
    if values.len() != names.len() {
        Err(QueryError::SizeMismatch {
            expected: names.len(),
            actual: values.len(),
        })
    } else {
        Ok(())
    }
}

/// The same values everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDb {
    label: String,
    values: BTreeMap<String, f64>,
}

impl UniformDb {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn from_values<S: Into<String>>(label: impl Into<String>, values: impl IntoIterator<Item = (S, f64)>) -> Self {
        Self {
            label: label.into(),
            values: values
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

impl SpatialDatabase for UniformDb {
    fn label(&self) -> &str {
        &self.label
    }

    fn value_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn query(&self, values: &mut [f64], names: &[&str], _point: &[f64]) -> Result<(), QueryError> {
        check_output_len(values, names)?;
        for (value, name) in values.iter_mut().zip(names) {
            *value = *self
                .values
                .get(*name)
                .ok_or_else(|| QueryError::UnknownValue {
                    db: self.label.clone(),
                    name: name.to_string(),
                })?;
        }
        Ok(())
    }
}

type ValueFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Values given by closures of position, e.g. analytic fields in tests and benchmarks.
pub struct FunctionDb {
    label: String,
    functions: BTreeMap<String, ValueFn>,
}

impl Debug for FunctionDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDb")
            .field("label", &self.label)
            .field("values", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionDb {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            functions: BTreeMap::new(),
        }
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
        self
    }
}

impl SpatialDatabase for FunctionDb {
    fn label(&self) -> &str {
        &self.label
    }

    fn value_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    fn query(&self, values: &mut [f64], names: &[&str], point: &[f64]) -> Result<(), QueryError> {
        check_output_len(values, names)?;
        for (value, name) in values.iter_mut().zip(names) {
            let function = self
                .functions
                .get(*name)
                .ok_or_else(|| QueryError::UnknownValue {
                    db: self.label.clone(),
                    name: name.to_string(),
                })?;
            *value = function(point);
        }
        Ok(())
    }
}

/// Routes a fixed set of names to a primary database and everything else to a secondary one.
pub struct CompositeDb {
    label: String,
    primary: Arc<dyn SpatialDatabase>,
    primary_names: Vec<String>,
    secondary: Arc<dyn SpatialDatabase>,
}

impl Debug for CompositeDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDb")
            .field("label", &self.label)
            .field("primary", &self.primary.label())
            .field("primary_names", &self.primary_names)
            .field("secondary", &self.secondary.label())
            .finish()
    }
}

impl CompositeDb {
    pub fn new(
        label: impl Into<String>,
        primary: Arc<dyn SpatialDatabase>,
        primary_names: Vec<String>,
        secondary: Arc<dyn SpatialDatabase>,
    ) -> Self {
        Self {
            label: label.into(),
            primary,
            primary_names,
            secondary,
        }
    }
}

impl SpatialDatabase for CompositeDb {
    fn label(&self) -> &str {
        &self.label
    }

    fn value_names(&self) -> Vec<String> {
        let mut names = self.primary_names.clone();
        names.extend(
            self.secondary
                .value_names()
                .into_iter()
                .filter(|name| !self.primary_names.contains(name)),
        );
        names
    }

    fn query(&self, values: &mut [f64], names: &[&str], point: &[f64]) -> Result<(), QueryError> {
        check_output_len(values, names)?;
        let (primary, secondary): (Vec<_>, Vec<_>) = names
            .iter()
            .enumerate()
            .partition(|(_, name)| self.primary_names.iter().any(|n| n == *name));

        for (db, selection) in [(&self.primary, primary), (&self.secondary, secondary)] {
            if selection.is_empty() {
                continue;
            }
            let selected_names: Vec<&str> = selection.iter().map(|(_, name)| **name).collect();
            let mut selected_values = vec![0.0; selection.len()];
            db.query(&mut selected_values, &selected_names, point)?;
            for ((idx, _), value) in selection.iter().zip(selected_values) {
                values[*idx] = value;
            }
        }
        Ok(())
    }
}
