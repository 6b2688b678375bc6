use rupture::io::vtk::snapshot_to_dataset;
use rupture::io::{FaultObserver, FaultSnapshot, MemoryObserver, OutputTrigger, SnapshotField, VtkFaultWriter};
use std::path::PathBuf;
use vtkio::model::DataSet;

fn snapshot(step: usize) -> FaultSnapshot {
    FaultSnapshot {
        label: "main fault".to_string(),
        time: 0.5 * step as f64,
        step,
        coordinates: vec![[0.0, 1.0, 0.0], [0.0, -1.0, 0.0]],
        cells: vec![vec![0, 1]],
        fields: vec![SnapshotField {
            name: "slip".to_string(),
            components: 2,
            values: vec![1.0, 0.0, 2.0, 0.0],
        }],
    }
}

fn scratch_directory(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rupture-{}-{}", name, std::process::id()))
}

#[test]
fn every_step_trigger() {
    let mut trigger = OutputTrigger::every_step(2);
    let writes: Vec<usize> = (0..7).filter(|&step| trigger.should_write(step as f64, step)).collect();
    assert_eq!(writes, vec![0, 3, 6]);
    assert_eq!(OutputTrigger::default(), OutputTrigger::every_step(0));
}

#[test]
fn time_trigger_tolerates_round_off() {
    let mut trigger = OutputTrigger::time(0.3);
    let mut writes = Vec::new();
    let mut t = 0.0;
    for step in 0..10 {
        if trigger.should_write(t, step) {
            writes.push(step);
        }
        t += 0.1;
    }
    assert_eq!(writes, vec![0, 3, 6, 9]);
}

#[test]
fn trigger_from_json() {
    let trigger: OutputTrigger = serde_json::from_str(r#"{ "type": "time", "time_skip": 2.0 }"#).unwrap();
    assert_eq!(trigger, OutputTrigger::time(2.0));
}

#[test]
fn memory_observer_keeps_snapshots() {
    let mut observer = MemoryObserver::new();
    observer.observe(&snapshot(0)).unwrap();
    observer.observe(&snapshot(1)).unwrap();
    assert_eq!(observer.snapshots().len(), 2);
    assert_eq!(observer.snapshots()[1].field("slip").unwrap().values[2], 2.0);
    assert!(observer.snapshots()[0].field("traction").is_none());
}

#[test]
fn dataset_has_cells_and_point_data() {
    let dataset = snapshot_to_dataset(&snapshot(0)).unwrap();
    match dataset {
        DataSet::UnstructuredGrid { pieces, .. } => assert_eq!(pieces.len(), 1),
        other => panic!("unexpected data set {:?}", other),
    }
}

#[test]
fn inconsistent_fields_are_rejected() {
    let mut bad = snapshot(0);
    bad.fields[0].values.pop();
    assert!(snapshot_to_dataset(&bad).is_err());

    let mut bad = snapshot(0);
    bad.cells = vec![vec![0, 1, 0, 1, 0]];
    assert!(snapshot_to_dataset(&bad).is_err());
}

#[test]
fn vtk_writer_writes_one_file_per_snapshot() {
    let directory = scratch_directory("vtk-writer");
    let mut writer = VtkFaultWriter::new(&directory, "out");
    let path = writer.path_for(&snapshot(3));
    assert_eq!(path, directory.join("out_main_fault_00003.vtk"));

    writer.observe(&snapshot(3)).unwrap();
    let contents = std::fs::read(&path).unwrap();
    assert!(contents.starts_with(b"# vtk DataFile"));
    assert!(contents.windows(4).any(|w| w == b"slip"));
    std::fs::remove_dir_all(&directory).unwrap();
}
