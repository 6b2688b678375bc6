//! JSON configuration of faults, scales and output.
//!
//! ```json
//! {
//!   "scales": { "length_scale": 1000.0, "time_scale": 1.0, "pressure_scale": 3.0e10 },
//!   "faults": [
//!     {
//!       "type": "kinematic", "label": "fault", "id": 100,
//!       "sources": [{
//!         "name": "rupture", "origin_time": 0.0,
//!         "slip_function": { "type": "brune" },
//!         "database": { "type": "uniform", "values": { "slip-time": 0.0, "rise-time": 2.0,
//!           "left-lateral-slip": 1.0, "fault-opening": 0.0 } }
//!       }]
//!     }
//!   ]
//! }
//! ```
use crate::allocators::DimAllocator;
use crate::faults::{FaultCohesive, FaultCohesiveDyn, FaultCohesiveKin, KinematicSource, SlipTimeFunction};
use crate::feassemble::Integrator;
use crate::field::Discretization;
use crate::friction::FrictionModel;
use crate::io::{OutputTrigger, VtkFaultWriter};
use crate::problems::Problem;
use crate::topology::cohesive::FaultInsertion;
use crate::topology::Mesh;
use crate::Real;
use eyre::{eyre, WrapErr};
use log::info;
use nalgebra::{convert, DefaultAllocator, DimName};
use rupture_spatialdata::geocoords::CoordSys;
use rupture_spatialdata::nondimensional::Nondimensionalizer;
use rupture_spatialdata::spatialdb::SpatialDatabase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod database;

pub use database::{DatabaseConfig, TimeHistoryConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalesConfig {
    #[serde(default = "default_length_scale")]
    pub length_scale: f64,
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    #[serde(default = "default_pressure_scale")]
    pub pressure_scale: f64,
    #[serde(default = "default_density_scale")]
    pub density_scale: f64,
}

fn default_length_scale() -> f64 {
    Nondimensionalizer::default().length_scale()
}

fn default_time_scale() -> f64 {
    Nondimensionalizer::default().time_scale()
}

fn default_pressure_scale() -> f64 {
    Nondimensionalizer::default().pressure_scale()
}

fn default_density_scale() -> f64 {
    Nondimensionalizer::default().density_scale()
}

impl Default for ScalesConfig {
    fn default() -> Self {
        Self {
            length_scale: default_length_scale(),
            time_scale: default_time_scale(),
            pressure_scale: default_pressure_scale(),
            density_scale: default_density_scale(),
        }
    }
}

/// Slip time function of a kinematic source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlipFunctionConfig {
    ConstRate,
    Brune,
    Liu2006,
    TimeHistory { table: TimeHistoryConfig },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Seconds.
    #[serde(default)]
    pub origin_time: f64,
    pub slip_function: SlipFunctionConfig,
    pub database: DatabaseConfig,
    /// Overrides keyed by auxiliary subfield name, e.g. `final_slip`.
    #[serde(default)]
    pub discretization: BTreeMap<String, Discretization>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub trigger: OutputTrigger,
    /// Directory for VTK files, one per snapshot.
    pub vtk_directory: PathBuf,
}

/// One fault: the vertex label it is inserted along, the material id of its cohesive cells and
/// how its traction is determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FaultConfig {
    Kinematic {
        label: String,
        id: i32,
        sources: Vec<SourceConfig>,
        #[serde(default)]
        output: Option<OutputConfig>,
    },
    Dynamic {
        label: String,
        id: i32,
        friction: FrictionModel,
        /// Friction properties and initial state.
        database: DatabaseConfig,
        /// Traction per unit jump (Pa/m).
        augmentation: f64,
        #[serde(default)]
        output: Option<OutputConfig>,
    },
}

impl FaultConfig {
    pub fn label(&self) -> &str {
        match self {
            Self::Kinematic { label, .. } | Self::Dynamic { label, .. } => label,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::Kinematic { id, .. } | Self::Dynamic { id, .. } => *id,
        }
    }

    pub fn output(&self) -> Option<&OutputConfig> {
        match self {
            Self::Kinematic { output, .. } | Self::Dynamic { output, .. } => output.as_ref(),
        }
    }
}

fn default_up_dir() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn default_to_meters() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub scales: ScalesConfig,
    /// Meters per unit of the mesh coordinates.
    #[serde(default = "default_to_meters")]
    pub to_meters: f64,
    #[serde(default = "default_up_dir")]
    pub up_dir: [f64; 3],
    pub faults: Vec<FaultConfig>,
    /// Directory against which relative paths are resolved.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let config: Self = serde_json::from_str(json).wrap_err("failed to parse simulation configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read configuration file {}", path.display()))?;
        let mut config = Self::from_json_str(&json).wrap_err_with(|| format!("in file {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        for (i, fault) in self.faults.iter().enumerate() {
            if self.faults[..i].iter().any(|other| other.label() == fault.label()) {
                return Err(eyre!("fault label '{}' appears twice", fault.label()));
            }
            if self.faults[..i].iter().any(|other| other.id() == fault.id()) {
                return Err(eyre!("fault id {} appears twice", fault.id()));
            }
            if let FaultConfig::Kinematic { label, sources, .. } = fault {
                if sources.is_empty() {
                    return Err(eyre!("kinematic fault '{}' has no sources", label));
                }
            }
        }
        if !(self.to_meters.is_finite() && self.to_meters > 0.0) {
            return Err(eyre!("to_meters must be positive, got {}", self.to_meters));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> eyre::Result<Nondimensionalizer> {
        let s = &self.scales;
        Ok(Nondimensionalizer::new(s.length_scale, s.time_scale, s.pressure_scale, s.density_scale)?)
    }

    pub fn coordsys(&self, space_dim: usize) -> CoordSys {
        CoordSys::cartesian(space_dim).with_to_meters(self.to_meters)
    }

    /// The faults to insert into the mesh before building integrators, in configuration order.
    pub fn fault_insertions(&self) -> Vec<FaultInsertion> {
        self.faults
            .iter()
            .map(|fault| FaultInsertion::new(fault.label(), fault.id()))
            .collect()
    }

    /// Builds and initializes the integrator of every fault of a mesh with inserted faults.
    pub fn build_integrators<T, D>(&self, mesh: &Mesh<T, D>) -> eyre::Result<Vec<Box<dyn Integrator<T>>>>
    where
        T: Real,
        D: DimName,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let normalizer = self.normalizer()?;
        let coordsys = self.coordsys(D::dim());
        let mut integrators: Vec<Box<dyn Integrator<T>>> = Vec::with_capacity(self.faults.len());
        for fault_config in &self.faults {
            let fault = FaultCohesive::new(mesh, fault_config.label(), fault_config.id(), self.up_dir)?;
            let integrator: Box<dyn Integrator<T>> = match fault_config {
                FaultConfig::Kinematic { sources, .. } => {
                    let mut kin = FaultCohesiveKin::new(fault);
                    for source_config in sources {
                        let (source, db) = self.build_source(source_config)?;
                        kin.add_source(source, db)?;
                    }
                    kin.initialize(&coordsys, &normalizer)
                        .wrap_err_with(|| format!("failed to initialize fault '{}'", fault_config.label()))?;
                    Box::new(kin)
                }
                FaultConfig::Dynamic {
                    friction,
                    database,
                    augmentation,
                    ..
                } => {
                    let db = database.build(&self.base_dir)?;
                    let mut dynamic = FaultCohesiveDyn::new(fault, friction.clone(), db, convert(*augmentation))?;
                    dynamic
                        .initialize(&coordsys, &normalizer)
                        .wrap_err_with(|| format!("failed to initialize fault '{}'", fault_config.label()))?;
                    Box::new(dynamic)
                }
            };
            integrators.push(integrator);
        }
        info!("Built {} fault integrators from configuration", integrators.len());
        Ok(integrators)
    }

    fn build_source<T: Real>(
        &self,
        config: &SourceConfig,
    ) -> eyre::Result<(KinematicSource<T>, Arc<dyn SpatialDatabase>)> {
        let function = match &config.slip_function {
            SlipFunctionConfig::ConstRate => SlipTimeFunction::ConstRate,
            SlipFunctionConfig::Brune => SlipTimeFunction::Brune,
            SlipFunctionConfig::Liu2006 => SlipTimeFunction::Liu2006,
            SlipFunctionConfig::TimeHistory { table } => SlipTimeFunction::TimeHistory(table.build(&self.base_dir)?),
        };
        for name in config.discretization.keys() {
            if !function.subfield_names().contains(&name.as_str()) {
                return Err(eyre!(
                    "source '{}' has no subfield '{}' (available: {:?})",
                    config.name,
                    name,
                    function.subfield_names()
                ));
            }
        }
        let mut source = KinematicSource::new(config.name.clone(), function, convert(config.origin_time));
        for (name, discretization) in &config.discretization {
            source = source.with_discretization(name.clone(), *discretization);
        }
        let db = config.database.build(&self.base_dir)?;
        Ok((source, db))
    }

    /// Builds a problem with every fault integrator and its output.
    pub fn build_problem<T, D>(&self, mesh: &Mesh<T, D>) -> eyre::Result<Problem<T>>
    where
        T: Real,
        D: DimName,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let mut problem = Problem::new(self.normalizer()?);
        for integrator in self.build_integrators(mesh)? {
            problem.add_integrator(integrator)?;
        }
        for fault in &self.faults {
            if let Some(output) = fault.output() {
                let writer = VtkFaultWriter::new(self.base_dir.join(&output.vtk_directory), fault.label());
                problem.add_output(fault.label(), output.trigger.clone(), Box::new(writer))?;
            }
        }
        Ok(problem)
    }
}
