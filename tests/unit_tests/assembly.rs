use rupture::assembly::{assemble_jacobian_par, assemble_residual_par, DofMap, LocalMatrix, LocalVector, SparseJacobian};
use rupture::error::FaultError;
use rupture::field::{Field, SubfieldInfo};
use rupture::nalgebra::DMatrix;
use rupture::topology::PointRange;

/// Two values on points 1 and 3, one on point 2.
fn field() -> Field<f64> {
    let mut field = Field::new("f", PointRange::new(1, 4), vec![SubfieldInfo::new("u", vec!["x".into(), "y".into()], 1.0)]);
    field.set_fiber_dimension(1, 2).unwrap();
    field.set_fiber_dimension(2, 1).unwrap();
    field.set_fiber_dimension(3, 2).unwrap();
    field.allocate();
    field
}

#[test]
fn dof_map_follows_section() {
    let field = field();
    let dof_map = DofMap::from_field(&field).unwrap();
    assert_eq!(dof_map.num_dofs(), 5);
    assert_eq!(dof_map.dofs(2).unwrap(), 2..3);
    let mut dofs = Vec::new();
    dof_map.collect_dofs(&[3, 1], &mut dofs).unwrap();
    assert_eq!(dofs, vec![3, 4, 0, 1]);

    let unallocated = Field::<f64>::new("g", PointRange::new(0, 1), vec![SubfieldInfo::scalar("a", 1.0)]);
    assert!(DofMap::from_field(&unallocated).is_err());
}

#[test]
fn local_vectors_are_validated_before_assembly() {
    let mut field = field();
    let mut local = LocalVector::new();
    local.push(2, &[1.0]);
    local.push(3, &[2.0, 3.0]);
    local.assemble_into(&mut field).unwrap();
    local.assemble_into(&mut field).unwrap();
    assert_eq!(field.values().as_slice(), &[0.0, 0.0, 2.0, 4.0, 6.0]);

    let mut bad = LocalVector::new();
    bad.push(1, &[1.0, 1.0]);
    bad.push(2, &[1.0, 1.0]);
    assert!(bad.assemble_into(&mut field).is_err());
    assert_eq!(field.values().as_slice(), &[0.0, 0.0, 2.0, 4.0, 6.0]);
}

#[test]
fn parallel_residual_assembly_is_all_or_nothing() {
    let mut residual = field();
    let items: Vec<usize> = (0..10).collect();
    assemble_residual_par(&mut residual, &items, |&i| {
        let mut local = LocalVector::new();
        local.push(1, &[i as f64, 1.0]);
        Ok(local)
    })
    .unwrap();
    assert_eq!(residual.restrict_point(1).unwrap(), &[45.0, 10.0]);

    let before = residual.clone();
    let result = assemble_residual_par(&mut residual, &items, |&i| {
        if i == 7 {
            return Err(FaultError::invariant("failing item"));
        }
        let mut local = LocalVector::new();
        local.push(2, &[1.0]);
        Ok(local)
    });
    assert!(result.is_err());
    assert_eq!(residual, before);
}

#[test]
fn jacobian_sums_duplicate_entries() {
    let dof_map = DofMap::from_field(&field()).unwrap();
    let mut jacobian = SparseJacobian::new(dof_map);
    let mut block = LocalMatrix::zeros(vec![2], vec![1, 2], 1, 3);
    block.values = DMatrix::from_row_slice(1, 3, &[1.0, 0.0, 2.0]);
    jacobian.add_local(&block).unwrap();
    jacobian.add_local(&block).unwrap();
    // Zeros are not stored
    assert_eq!(jacobian.coo().nnz(), 4);

    let dense = jacobian.to_dense();
    assert_eq!(dense[(2, 0)], 2.0);
    assert_eq!(dense[(2, 2)], 4.0);
    assert_eq!(jacobian.to_csr().nnz(), 2);

    let wrong_size = LocalMatrix::zeros(vec![1], vec![1], 1, 2);
    assert!(jacobian.add_local(&wrong_size).is_err());

    jacobian.zero();
    assert_eq!(jacobian.coo().nnz(), 0);
    assert_eq!(jacobian.num_dofs(), 5);
}

#[test]
fn parallel_jacobian_assembly() {
    let dof_map = DofMap::from_field(&field()).unwrap();
    let mut jacobian: SparseJacobian<f64> = SparseJacobian::new(dof_map);
    let items = [1usize, 2, 3];
    assemble_jacobian_par(&mut jacobian, &items, |&point| {
        let n = if point == 2 { 1 } else { 2 };
        let mut block = LocalMatrix::zeros(vec![point], vec![point], n, n);
        block.values.fill_with_identity();
        Ok(block)
    })
    .unwrap();
    assert_eq!(jacobian.to_dense(), DMatrix::identity(5, 5));
}
