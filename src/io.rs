//! Fault output: snapshots, observers and output triggers.
mod trigger;
pub mod vtk;

pub use trigger::OutputTrigger;
pub use vtk::VtkFaultWriter;

/// A named field on the fault, with `components` values per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotField {
    pub name: String,
    pub components: usize,
    pub values: Vec<f64>,
}

/// The dimensional state of a fault at one output time.
///
/// Vertices are the Lagrange vertices of the fault, in increasing point order. Cells index into
/// the vertex list.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultSnapshot {
    pub label: String,
    pub time: f64,
    pub step: usize,
    pub coordinates: Vec<[f64; 3]>,
    pub cells: Vec<Vec<usize>>,
    pub fields: Vec<SnapshotField>,
}

impl FaultSnapshot {
    pub fn field(&self, name: &str) -> Option<&SnapshotField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Receives fault snapshots.
pub trait FaultObserver {
    fn observe(&mut self, snapshot: &FaultSnapshot) -> eyre::Result<()>;
}

/// Keeps every snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryObserver {
    snapshots: Vec<FaultSnapshot>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[FaultSnapshot] {
        &self.snapshots
    }
}

impl FaultObserver for MemoryObserver {
    fn observe(&mut self, snapshot: &FaultSnapshot) -> eyre::Result<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}
