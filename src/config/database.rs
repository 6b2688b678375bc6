use eyre::{eyre, WrapErr};
use rupture_spatialdata::spatialdb::{SimpleDb, SpatialDatabase, UniformDb};
use rupture_spatialdata::timehistory::TimeHistory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A spatial database, given inline or by file.
///
/// Relative paths are resolved against the directory of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Uniform {
        #[serde(default = "default_uniform_label")]
        label: String,
        values: BTreeMap<String, f64>,
    },
    SimpleFile {
        path: PathBuf,
        #[serde(default)]
        max_distance: Option<f64>,
    },
    /// The text of a SimpleDB file embedded in the configuration.
    SimpleInline {
        label: String,
        text: String,
        #[serde(default)]
        max_distance: Option<f64>,
    },
}

fn default_uniform_label() -> String {
    "uniform".to_string()
}

impl DatabaseConfig {
    pub fn uniform<S: Into<String>>(values: impl IntoIterator<Item = (S, f64)>) -> Self {
        Self::Uniform {
            label: default_uniform_label(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn build(&self, base_dir: &Path) -> eyre::Result<Arc<dyn SpatialDatabase>> {
        let db: Arc<dyn SpatialDatabase> = match self {
            Self::Uniform { label, values } => Arc::new(UniformDb::from_values(label.clone(), values.clone())),
            Self::SimpleFile { path, max_distance } => {
                let db = SimpleDb::from_file(base_dir.join(path))?;
                Arc::new(with_max_distance(db, *max_distance))
            }
            Self::SimpleInline {
                label,
                text,
                max_distance,
            } => {
                let db = SimpleDb::from_ascii(label.clone(), text)
                    .wrap_err_with(|| format!("failed to parse inline spatial database '{}'", label))?;
                Arc::new(with_max_distance(db, *max_distance))
            }
        };
        Ok(db)
    }
}

fn with_max_distance(db: SimpleDb, max_distance: Option<f64>) -> SimpleDb {
    match max_distance {
        Some(distance) => db.with_max_distance(distance),
        None => db,
    }
}

/// Amplitude table of a time-history slip function. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeHistoryConfig {
    File { path: PathBuf },
    Inline { times: Vec<f64>, amplitudes: Vec<f64> },
}

impl TimeHistoryConfig {
    pub fn build(&self, base_dir: &Path) -> eyre::Result<TimeHistory> {
        match self {
            Self::File { path } => TimeHistory::from_file(base_dir.join(path)),
            Self::Inline { times, amplitudes } => TimeHistory::new("inline", times.clone(), amplitudes.clone())
                .map_err(|err| eyre!("invalid inline time history: {}", err)),
        }
    }
}
