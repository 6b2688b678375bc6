use crate::ascii::AsciiDocument;
use crate::error::{ParseError, QueryError};
use crate::geocoords::CoordSys;
use crate::spatialdb::{check_output_len, SpatialDatabase};
use crate::units::parse_scale;
use eyre::WrapErr;
use log::debug;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree};
use std::path::Path;

type IndexedLocation = GeomWithData<[f64; 3], usize>;

fn padded_point(coords: &[f64]) -> [f64; 3] {
    let mut point = [0.0; 3];
    for (p, x) in point.iter_mut().zip(coords) {
        *p = *x;
    }
    point
}

/// Values given at scattered locations, queried by nearest neighbor.
///
/// A database with a single location is uniform. Otherwise a query point farther than
/// `max_distance` (if set) from every location is outside the domain of support.
#[derive(Debug, Clone)]
pub struct SimpleDb {
    label: String,
    names: Vec<String>,
    space_dim: usize,
    tree: RTree<IndexedLocation>,
    /// Row-major, one row of `names.len()` values per location.
    values: Vec<f64>,
    max_distance: Option<f64>,
}

impl SimpleDb {
    /// Builds a database from rows of `space_dim` coordinates (meters) followed by one value
    /// per name (SI units).
    pub fn from_rows(
        label: impl Into<String>,
        space_dim: usize,
        names: Vec<String>,
        rows: &[Vec<f64>],
    ) -> Result<Self, QueryError> {
        let label = label.into();
        let row_len = space_dim + names.len();
        if space_dim == 0 || space_dim > 3 {
            return Err(QueryError::InvalidData {
                db: label,
                message: format!("unsupported spatial dimension {}", space_dim),
            });
        }
        if rows.is_empty() {
            return Err(QueryError::InvalidData {
                db: label,
                message: "database has no locations".to_string(),
            });
        }
        if let Some(idx) = rows.iter().position(|row| row.len() != row_len) {
            return Err(QueryError::InvalidData {
                db: label,
                message: format!("row {} does not have {} entries", idx, row_len),
            });
        }

        let locations = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| GeomWithData::new(padded_point(&row[..space_dim]), idx))
            .collect();
        let values = rows
            .iter()
            .flat_map(|row| row[space_dim..].iter().copied())
            .collect();

        Ok(Self {
            label,
            names,
            space_dim,
            tree: RTree::bulk_load(locations),
            values,
            max_distance: None,
        })
    }

    pub fn with_max_distance(self, max_distance: f64) -> Self {
        Self {
            max_distance: Some(max_distance),
            ..self
        }
    }

    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    pub fn num_locations(&self) -> usize {
        self.tree.size()
    }

    /// Parses the SimpleDB ASCII format.
    ///
    /// ```text
    /// #SPATIAL.ascii 1
    /// SimpleDB {
    ///   num-values = 2
    ///   value-names = left-lateral-slip fault-opening
    ///   value-units = m m
    ///   num-locs = 2
    ///   data-dim = 1
    ///   space-dim = 2
    ///   cs-data = cartesian {
    ///     to-meters = 1.0e3
    ///     space-dim = 2
    ///   }
    /// }
    /// 0.0  1.0   2.3  0.0
    /// 0.0 -1.0   2.4  0.0
    /// ```
    pub fn from_ascii(label: impl Into<String>, text: &str) -> Result<Self, ParseError> {
        let document = AsciiDocument::parse(text, "#SPATIAL.ascii", "SimpleDB")?;
        let num_values: usize = document.get_parsed("num-values")?;
        let (names_line, names) = document.get_list("value-names")?;
        if names.len() != num_values {
            return Err(ParseError::new(
                names_line,
                format!("expected {} value names, found {}", num_values, names.len()),
            ));
        }

        let (units_line, units) = document.get_list("value-units")?;
        if units.len() != num_values {
            return Err(ParseError::new(
                units_line,
                format!("expected {} value units, found {}", num_values, units.len()),
            ));
        }
        let scales = units
            .iter()
            .map(|unit| parse_scale(unit).ok_or_else(|| ParseError::new(units_line, format!("unknown unit '{}'", unit))))
            .collect::<Result<Vec<_>, _>>()?;

        let num_locs: usize = document.get_parsed("num-locs")?;
        let data_dim: usize = document.get_parsed("data-dim")?;
        let space_dim: usize = document.get_parsed("space-dim")?;
        let to_meters: f64 = document.get_parsed_or("cs-data.to-meters", 1.0)?;
        if data_dim > space_dim {
            let (line, _) = document.get("data-dim")?;
            return Err(ParseError::new(line, "data-dim exceeds space-dim"));
        }
        let coordsys = CoordSys::cartesian(space_dim).with_to_meters(to_meters);

        let mut rows = document.data_rows(space_dim + num_values, num_locs)?;
        for row in &mut rows {
            coordsys.convert_to_meters(&mut row[..space_dim]);
            for (value, scale) in row[space_dim..].iter_mut().zip(&scales) {
                *value *= scale;
            }
        }

        let names = names.into_iter().map(str::to_string).collect();
        Self::from_rows(label, space_dim, names, &rows).map_err(|err| ParseError::new(0, err.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read spatial database {}", path.display()))?;
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "simple db".to_string());
        let db = Self::from_ascii(label, &text).wrap_err_with(|| format!("in file {}", path.display()))?;
        debug!("Loaded spatial database {} with {} locations", path.display(), db.num_locations());
        Ok(db)
    }
}

impl SpatialDatabase for SimpleDb {
    fn label(&self) -> &str {
        &self.label
    }

    fn value_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn query(&self, values: &mut [f64], names: &[&str], point: &[f64]) -> Result<(), QueryError> {
        check_output_len(values, names)?;
        let query_point = padded_point(point);
        let nearest = self
            .tree
            .nearest_neighbor(&query_point)
            .ok_or_else(|| QueryError::NotFound {
                db: self.label.clone(),
                point: point.to_vec(),
            })?;

        if let Some(max_distance) = self.max_distance {
            if self.tree.size() > 1 && nearest.distance_2(&query_point) > max_distance * max_distance {
                return Err(QueryError::NotFound {
                    db: self.label.clone(),
                    point: point.to_vec(),
                });
            }
        }

        let num_values = self.names.len();
        let row = &self.values[nearest.data * num_values..(nearest.data + 1) * num_values];
        for (value, name) in values.iter_mut().zip(names) {
            let column = self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| QueryError::UnknownValue {
                    db: self.label.clone(),
                    name: name.to_string(),
                })?;
            *value = row[column];
        }
        Ok(())
    }
}
