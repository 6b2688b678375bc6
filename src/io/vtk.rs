//! Legacy VTK output of fault snapshots.
use crate::io::{FaultObserver, FaultSnapshot};
use eyre::{eyre, WrapErr};
use log::debug;
use std::path::PathBuf;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, Piece, UnstructuredGridPiece,
    Version, VertexNumbers, Vtk,
};

fn cell_type(num_vertices: usize) -> eyre::Result<CellType> {
    match num_vertices {
        2 => Ok(CellType::Line),
        3 => Ok(CellType::Triangle),
        4 => Ok(CellType::Quad),
        n => Err(eyre!("no VTK cell type for fault cells with {} vertices", n)),
    }
}

/// Builds an unstructured grid with point data from a snapshot.
pub fn snapshot_to_dataset(snapshot: &FaultSnapshot) -> eyre::Result<DataSet> {
    let points: Vec<f64> = snapshot.coordinates.iter().flat_map(|x| x.iter().copied()).collect();

    // Vertices is laid out as follows: N, i_1, i_2, ... i_N
    let mut vertices = Vec::new();
    let mut types = Vec::with_capacity(snapshot.cells.len());
    for cell in &snapshot.cells {
        vertices.push(u32::try_from(cell.len())?);
        for &idx in cell {
            vertices.push(u32::try_from(idx)?);
        }
        types.push(cell_type(cell.len())?);
    }

    let mut point_data = Vec::with_capacity(snapshot.fields.len());
    for field in &snapshot.fields {
        if field.components == 0 || field.components > 4 {
            return Err(eyre!(
                "field '{}' has {} components, legacy VTK scalars support 1 to 4",
                field.name,
                field.components
            ));
        }
        if field.values.len() != field.components * snapshot.coordinates.len() {
            return Err(eyre!(
                "field '{}' has {} values for {} vertices with {} components",
                field.name,
                field.values.len(),
                snapshot.coordinates.len(),
                field.components
            ));
        }
        point_data.push(Attribute::DataArray(DataArray {
            name: field.name.clone(),
            elem: ElementType::Scalars {
                num_comp: field.components as u32,
                lookup_table: None,
            },
            data: field.values.clone().into(),
        }));
    }

    let piece = UnstructuredGridPiece {
        points: points.into(),
        cells: Cells {
            cell_verts: VertexNumbers::Legacy {
                num_cells: u32::try_from(snapshot.cells.len())?,
                vertices,
            },
            types,
        },
        data: Attributes {
            point: point_data,
            cell: Vec::new(),
        },
    };

    Ok(DataSet::UnstructuredGrid {
        meta: None,
        pieces: vec![Piece::Inline(Box::new(piece))],
    })
}

/// Writes every snapshot to `<directory>/<prefix>_<label>_<step>.vtk`.
#[derive(Debug, Clone)]
pub struct VtkFaultWriter {
    directory: PathBuf,
    prefix: String,
}

impl VtkFaultWriter {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, snapshot: &FaultSnapshot) -> PathBuf {
        let label: String = snapshot
            .label
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.directory
            .join(format!("{}_{}_{:05}.vtk", self.prefix, label, snapshot.step))
    }
}

impl FaultObserver for VtkFaultWriter {
    fn observe(&mut self, snapshot: &FaultSnapshot) -> eyre::Result<()> {
        let path = self.path_for(snapshot);
        let dataset = snapshot_to_dataset(snapshot)?;
        std::fs::create_dir_all(&self.directory)
            .wrap_err_with(|| format!("failed to create output directory {}", self.directory.display()))?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            title: format!("{} at t = {}", snapshot.label, snapshot.time),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(&path)
        .wrap_err_with(|| format!("failed to write fault output to {}", path.display()))?;
        debug!("Wrote fault output to {}", path.display());
        Ok(())
    }
}
