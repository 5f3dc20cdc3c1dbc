//! Integration tests for pliant-fem.

use approx::assert_relative_eq;
use pliant_math::cg::norm;
use pliant_math::{DVec3, LinearOperator};
use pliant_material::{Material, MaterialModelKind, MaterialProperties};
use pliant_mesh::generators::{box_mesh, unit_tetrahedron};
use pliant_mesh::{VolumeMesh, VolumeTopology};
use pliant_fem::{
    DirichletBoundaryCondition, FemElement, FemModel, FemSolver, FemState, IntegrationScheme,
    NewmarkParameters, SolverConfig, StateUpdater, WeightedSum,
};
use pliant_types::{ElementId, PliantError, SolverStage};

fn rubber(nu: f64) -> MaterialProperties {
    MaterialProperties {
        youngs_modulus: 1.0e6,
        poisson_ratio: nu,
        mass_density: 1000.0,
        mass_damping: 0.0,
        stiffness_damping: 0.0,
    }
}

fn default_updater() -> StateUpdater {
    StateUpdater::velocity_newmark(NewmarkParameters::default()).unwrap()
}

/// Bar along +x from 0 to `length`, square cross-section `side`.
fn bar(length: f64, side: f64, cells: usize) -> VolumeMesh {
    let mut mesh = box_mesh(cells, 1, 1, DVec3::new(length, side, side));
    mesh.translate(DVec3::new(0.5 * length, 0.0, 0.0));
    mesh
}

fn vertices_at_x(mesh: &VolumeMesh, x: f64) -> Vec<usize> {
    (0..mesh.vertex_count())
        .filter(|&i| (mesh.vertices[i].x - x).abs() < 1e-12)
        .collect()
}

fn clamp(mesh: &VolumeMesh, vertices: &[usize]) -> DirichletBoundaryCondition {
    let mut bc = DirichletBoundaryCondition::new();
    for &v in vertices {
        bc.fix_vertex(v, mesh.vertices[v]).unwrap();
    }
    bc
}

// ─── FemElement Tests ─────────────────────────────────────────

#[test]
fn element_rejects_out_of_range_vertex() {
    let mesh = unit_tetrahedron(1.0);
    let material = Material::new(MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let err = FemElement::new(
        ElementId(0),
        [0, 1, 2, 9],
        &mesh.element_positions(0),
        material,
        1000.0,
        4,
    )
    .unwrap_err();
    assert!(matches!(err, PliantError::InvalidConfig(_)));
}

#[test]
fn element_rejects_inverted_reference() {
    let mesh = unit_tetrahedron(1.0);
    let material = Material::new(MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let [x0, x1, x2, x3] = mesh.element_positions(0);
    let err = FemElement::new(ElementId(0), [0, 2, 1, 3], &[x0, x2, x1, x3], material, 1000.0, 4)
        .unwrap_err();
    assert!(matches!(err, PliantError::InvalidMesh(_)));
}

#[test]
fn element_reference_data() {
    let mesh = unit_tetrahedron(1.0);
    let material = Material::new(MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    let element =
        FemElement::new(ElementId(0), [0, 1, 2, 3], &mesh.element_positions(0), material, 600.0, 4)
            .unwrap();
    assert_relative_eq!(element.volume(), 1.0 / 6.0, epsilon = 1e-15);
    assert_relative_eq!(element.lumped_mass(), 25.0, epsilon = 1e-12);
    let sum: DVec3 = element.shape_gradients().iter().copied().sum();
    assert!(sum.length() < 1e-14);
    assert_eq!(element.global_dof(7), 3 * 2 + 1);
}

#[test]
fn element_stiffness_is_symmetric_and_translation_free() {
    let mesh = unit_tetrahedron(1.0);
    let material = Material::new(MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    let element =
        FemElement::new(ElementId(0), [0, 1, 2, 3], &mesh.element_positions(0), material, 1000.0, 4)
            .unwrap();

    let mut q = mesh.positions_flat();
    q[3] += 0.05;
    q[7] -= 0.02;
    let entry = element.evaluate(&q, &[0.0; 12], 0).unwrap();

    for i in 0..12 {
        for j in 0..12 {
            assert_relative_eq!(entry.stiffness[i][j], entry.stiffness[j][i], epsilon = 1e-6);
        }
    }
    // Rigid translation in x produces no force change.
    for i in 0..12 {
        let row_sum: f64 = (0..4).map(|b| entry.stiffness[i][3 * b]).sum();
        assert!(row_sum.abs() < 1e-6, "row {i}: {row_sum}");
    }
    // Internal forces are self-equilibrated.
    let total: f64 = (0..4).map(|a| entry.internal_force[3 * a]).sum();
    assert!(total.abs() < 1e-8);
}

#[test]
fn element_force_matches_energy_gradient() {
    let mesh = unit_tetrahedron(1.0);
    let props = MaterialProperties {
        youngs_modulus: 10.0,
        ..rubber(0.3)
    };
    let material = Material::new(MaterialModelKind::Corotated, &props).unwrap();
    let element =
        FemElement::new(ElementId(0), [0, 1, 2, 3], &mesh.element_positions(0), material, 1.0, 4)
            .unwrap();
    let mut q = mesh.positions_flat();
    q[5] += 0.1;
    q[9] -= 0.05;
    let v = [0.0; 12];
    let entry = element.evaluate(&q, &v, 0).unwrap();

    let h = 1e-6;
    for k in 0..12 {
        let mut plus = q.clone();
        let mut minus = q.clone();
        plus[k] += h;
        minus[k] -= h;
        let e_plus = element.evaluate(&plus, &v, 0).unwrap().energy;
        let e_minus = element.evaluate(&minus, &v, 0).unwrap().energy;
        let fd = (e_plus - e_minus) / (2.0 * h);
        assert!((entry.internal_force[k] - fd).abs() < 1e-6, "dof {k}");
    }
}

#[test]
fn collapsed_element_is_numerical_error_naming_element() {
    let mesh = box_mesh(1, 1, 1, DVec3::ONE);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    // Flatten the whole body onto z = 0.
    let q: Vec<f64> = mesh
        .positions_flat()
        .iter()
        .enumerate()
        .map(|(i, &x)| if i % 3 == 2 { 0.0 } else { x })
        .collect();
    let mut state = FemState::new(q, model.num_elements()).unwrap();
    match model.calc_residual(&mut state).unwrap_err() {
        PliantError::Numerical(msg) => assert!(msg.contains("element"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

// ─── FemState Tests ───────────────────────────────────────────

#[test]
fn state_from_mesh_starts_at_rest() {
    let mesh = box_mesh(2, 1, 1, DVec3::ONE);
    let state = FemState::from_mesh(&mesh);
    assert_eq!(state.num_dofs(), mesh.dof_count());
    assert_eq!(state.num_vertices(), mesh.vertex_count());
    assert!(state.v().iter().all(|&v| v == 0.0));
    assert!(state.a().iter().all(|&a| a == 0.0));
    assert_eq!(state.position(1), mesh.vertices[1]);
}

#[test]
fn state_rejects_bad_lengths() {
    assert!(FemState::new(vec![0.0; 5], 1).is_err());
    let state = FemState::new(vec![0.0; 6], 1).unwrap();
    assert!(state.clone().with_velocities(vec![0.0; 3]).is_err());
    assert!(state.with_accelerations(vec![0.0; 3]).is_err());
}

#[test]
fn state_with_wrong_element_count_is_rejected() {
    let mesh = bar(1.0, 0.1, 1);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let stretched: Vec<f64> = mesh
        .positions_flat()
        .iter()
        .enumerate()
        .map(|(i, &x)| if i % 3 == 0 { 1.5 * x } else { x })
        .collect();

    let mut empty = FemState::new(stretched.clone(), 0).unwrap();
    match model.calc_elastic_energy(&mut empty).unwrap_err() {
        PliantError::InvalidConfig(msg) => assert!(msg.contains("elements"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
    let mut short = FemState::new(stretched.clone(), model.num_elements() - 1).unwrap();
    assert!(model.calc_internal_force(&mut short).is_err());
    assert!(model.calc_residual(&mut short).is_err());

    let mut matching = FemState::new(stretched, model.num_elements()).unwrap();
    assert!(model.calc_elastic_energy(&mut matching).unwrap() > 0.0);
}

#[test]
fn cache_is_invalidated_by_generation() {
    let mesh = box_mesh(1, 1, 1, DVec3::ONE);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let mut state = model.make_state();
    assert!(!state.is_cache_valid(0));

    model.refresh_cache(&mut state).unwrap();
    assert!((0..model.num_elements()).all(|e| state.is_cache_valid(e)));
    let generation = state.generation();

    let updater = default_updater();
    let dz = vec![1e-3; state.num_dofs()];
    updater.update_state(&mut state, &dz, 0.01).unwrap();
    assert_eq!(state.generation(), generation + 1);
    assert!(!state.is_cache_valid(0));
    assert!(state.cached_entry(0).is_none());

    model.calc_residual(&mut state).unwrap();
    assert!(state.cached_entry(0).is_some());
}

#[test]
fn repeated_evaluation_reuses_cache() {
    let mesh = box_mesh(1, 1, 1, DVec3::ONE);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    let mut state = model.make_state();
    let first = model.calc_internal_force(&mut state).unwrap();
    let generation = state.generation();
    let second = model.calc_internal_force(&mut state).unwrap();
    assert_eq!(first, second);
    assert_eq!(state.generation(), generation);
}

// ─── Dirichlet Tests ──────────────────────────────────────────

#[test]
fn dirichlet_rejects_duplicates() {
    let mut bc = DirichletBoundaryCondition::new();
    bc.add_boundary_condition(4, 1.0, 0.0).unwrap();
    assert!(matches!(
        bc.add_boundary_condition(4, 2.0, 0.0),
        Err(PliantError::InvalidConfig(_))
    ));
    assert_eq!(bc.len(), 1);
}

#[test]
fn dirichlet_out_of_range_is_rejected_by_model() {
    let mesh = unit_tetrahedron(1.0);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let mut bc = DirichletBoundaryCondition::new();
    bc.add_boundary_condition(12, 0.0, 0.0).unwrap();
    assert!(matches!(
        model.set_dirichlet_boundary_condition(bc),
        Err(PliantError::InvalidConfig(_))
    ));
}

#[test]
fn dirichlet_residual_and_tangent() {
    let mesh = unit_tetrahedron(1.0);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    model.set_gravity(DVec3::new(0.0, 0.0, -9.81));
    model.set_dirichlet_boundary_condition(clamp(&mesh, &[0])).unwrap();
    let mut state = model.make_state();

    let residual = model.calc_residual(&mut state).unwrap();
    assert_eq!(&residual[0..3], &[0.0, 0.0, 0.0]);
    assert!(residual[5] > 0.0);

    let tangent = model
        .calc_tangent_matrix(&mut state, &default_updater().weights(0.01))
        .unwrap();
    assert_eq!(tangent.get(2, 2), 1.0);
    for j in 3..12 {
        assert_eq!(tangent.get(2, j), 0.0);
        assert_eq!(tangent.get(j, 2), 0.0);
    }
}

#[test]
fn dirichlet_dofs_hold_exactly_under_load() {
    let mesh = bar(1.0, 0.2, 4);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    model.set_gravity(DVec3::new(0.0, 0.0, -9.81));
    let fixed = vertices_at_x(&mesh, 0.0);
    let mut bc = clamp(&mesh, &fixed[1..]);
    // Pull the first clamped vertex to an offset position.
    let target = mesh.vertices[fixed[0]].x + 0.01;
    bc.add_boundary_condition(3 * fixed[0], target, 0.0).unwrap();
    bc.add_boundary_condition(3 * fixed[0] + 1, mesh.vertices[fixed[0]].y, 0.0).unwrap();
    bc.add_boundary_condition(3 * fixed[0] + 2, mesh.vertices[fixed[0]].z, 0.0).unwrap();
    model.set_dirichlet_boundary_condition(bc).unwrap();
    let tip = vertices_at_x(&mesh, 1.0);
    model.set_external_force(tip[0], DVec3::new(50.0, 0.0, -20.0)).unwrap();

    let solver = FemSolver::new(model, default_updater(), SolverConfig::default()).unwrap();
    let mut state = solver.model().make_state();
    for _ in 0..3 {
        state = solver.advance_one_time_step(&state, 0.01).unwrap().0;
        assert_eq!(state.q()[3 * fixed[0]], target);
        for &v in &fixed[1..] {
            assert_eq!(state.position(v), mesh.vertices[v]);
        }
    }

    let (static_state, _) = solver.solve_static(&state).unwrap();
    assert_eq!(static_state.q()[3 * fixed[0]], target);
}

// ─── StateUpdater Tests ───────────────────────────────────────

#[test]
fn newmark_parameter_validation() {
    let bad_beta = NewmarkParameters { beta: 0.6, gamma: 0.5 };
    assert!(StateUpdater::acceleration_newmark(bad_beta).is_err());
    let bad_gamma = NewmarkParameters { beta: 0.25, gamma: 1.5 };
    assert!(StateUpdater::velocity_newmark(bad_gamma).is_err());
    let zero_gamma = NewmarkParameters { beta: 0.0, gamma: 0.0 };
    assert!(StateUpdater::velocity_newmark(zero_gamma).is_err());
    assert!(StateUpdater::acceleration_newmark(zero_gamma).is_ok());
    // β = 0 and γ < ½ are accepted.
    let explicit_like = NewmarkParameters { beta: 0.0, gamma: 0.3 };
    assert!(StateUpdater::velocity_newmark(explicit_like).is_ok());
}

#[test]
fn updater_weights() {
    let p = NewmarkParameters::default();
    let dt = 0.1;
    let acc = StateUpdater::acceleration_newmark(p).unwrap().weights(dt);
    assert_relative_eq!(acc.w_q, 0.25 * dt * dt);
    assert_relative_eq!(acc.w_v, 0.5 * dt);
    assert_eq!(acc.w_a, 1.0);

    let vel = StateUpdater::velocity_newmark(p).unwrap().weights(dt);
    assert_relative_eq!(vel.w_q, 0.25 * dt / 0.5);
    assert_eq!(vel.w_v, 1.0);
    assert_relative_eq!(vel.w_a, 1.0 / (0.5 * dt));

    assert_eq!(StateUpdater::ZerothOrder.weights(dt), WeightedSum::STATIC);
    assert_eq!(StateUpdater::ZerothOrder.weights(dt).as_array(), [1.0, 0.0, 0.0]);
}

#[test]
fn scheme_round_trip() {
    let p = NewmarkParameters::default();
    for scheme in [
        IntegrationScheme::AccelerationNewmark,
        IntegrationScheme::VelocityNewmark,
        IntegrationScheme::ZerothOrder,
    ] {
        assert_eq!(StateUpdater::from_scheme(scheme, p).unwrap().scheme(), scheme);
    }
}

#[test]
fn newmark_forms_agree_under_constant_acceleration() {
    let params = NewmarkParameters { beta: 0.3, gamma: 0.6 };
    let dt = 0.05;
    let q0 = vec![0.0, 1.0, 2.0, -1.0, 0.5, 0.25];
    let v0 = vec![0.3, -0.2, 0.1, 0.0, 1.0, -1.0];
    let a0 = vec![-9.81, 0.0, 2.0, 1.0, -3.0, 0.5];
    let prev = FemState::new(q0, 0)
        .unwrap()
        .with_velocities(v0.clone())
        .unwrap()
        .with_accelerations(a0.clone())
        .unwrap();

    // Acceleration form: the predictor already holds a_{n+1} = a_n.
    let acc = StateUpdater::acceleration_newmark(params).unwrap();
    let by_acceleration = acc.advance_one_time_step(&prev, dt);

    // Velocity form: drive the unknown to the same v_{n+1}.
    let vel = StateUpdater::velocity_newmark(params).unwrap();
    let mut by_velocity = vel.advance_one_time_step(&prev, dt);
    let dz: Vec<f64> = by_acceleration
        .v()
        .iter()
        .zip(by_velocity.v())
        .map(|(target, current)| target - current)
        .collect();
    vel.update_state(&mut by_velocity, &dz, dt).unwrap();

    for i in 0..6 {
        assert_relative_eq!(by_velocity.q()[i], by_acceleration.q()[i], epsilon = 1e-12);
        assert_relative_eq!(by_velocity.v()[i], by_acceleration.v()[i], epsilon = 1e-12);
        assert_relative_eq!(by_velocity.a()[i], a0[i], epsilon = 1e-10);
        let expected_q = prev.q()[i] + dt * v0[i] + 0.5 * dt * dt * a0[i];
        assert_relative_eq!(by_acceleration.q()[i], expected_q, epsilon = 1e-12);
    }
}

#[test]
fn zeroth_order_predictor_holds_state() {
    let prev = FemState::new(vec![1.0, 2.0, 3.0], 0)
        .unwrap()
        .with_velocities(vec![4.0, 5.0, 6.0])
        .unwrap();
    let next = StateUpdater::ZerothOrder.advance_one_time_step(&prev, 0.1);
    assert_eq!(next.q(), prev.q());
    assert_eq!(next.v(), prev.v());
    assert!(next.generation() > prev.generation());
}

#[test]
fn update_state_rejects_wrong_length() {
    let mut state = FemState::new(vec![0.0; 6], 0).unwrap();
    assert!(default_updater().update_state(&mut state, &[1.0], 0.1).is_err());
}

// ─── FemModel Tests ───────────────────────────────────────────

#[test]
fn lumped_mass_totals_body_mass() {
    let size = DVec3::new(2.0, 1.0, 0.5);
    let mesh = box_mesh(3, 2, 2, size);
    let props = rubber(0.3);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &props).unwrap();
    assert_relative_eq!(
        model.total_mass(),
        props.mass_density * size.x * size.y * size.z,
        epsilon = 1e-9
    );
}

#[test]
fn model_rejects_invalid_inputs() {
    let mesh = unit_tetrahedron(1.0);
    let bad = MaterialProperties { youngs_modulus: -1.0, ..rubber(0.3) };
    assert!(FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &bad).is_err());
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    assert!(model.set_external_force(4, DVec3::X).is_err());
}

#[test]
fn reference_state_has_zero_residual_without_loads() {
    let mesh = box_mesh(2, 2, 2, DVec3::ONE);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.45)).unwrap();
    let mut state = model.make_state();
    assert!(norm(&model.calc_residual(&mut state).unwrap()) < 1e-9);
    assert!(model.calc_elastic_energy(&mut state).unwrap().abs() < 1e-12);
}

#[test]
fn tangent_operator_matches_assembled_matrix() {
    let mesh = box_mesh(2, 1, 1, DVec3::ONE);
    let props = MaterialProperties {
        mass_damping: 0.2,
        stiffness_damping: 0.01,
        ..rubber(0.3)
    };
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &props).unwrap();
    model.set_dirichlet_boundary_condition(clamp(&mesh, &[0, 1])).unwrap();
    let mut q = mesh.positions_flat();
    for (i, x) in q.iter_mut().enumerate() {
        *x += 0.01 * ((i * 7 % 5) as f64 - 2.0);
    }
    let mut state = FemState::new(q, model.num_elements()).unwrap();
    let weights = default_updater().weights(0.02);

    let matrix = model.calc_tangent_matrix(&mut state, &weights).unwrap();
    assert!(matrix.asymmetry() < 1e-6 * matrix.values.iter().fold(0.0_f64, |m, v| m.max(v.abs())));

    let n = model.num_dofs();
    let x: Vec<f64> = (0..n).map(|i| ((i * 13 % 11) as f64 - 5.0) * 0.1).collect();
    let mut expected = vec![0.0; n];
    matrix.mul_vec(&x, &mut expected);

    let operator = model.tangent_operator(&mut state, &weights).unwrap();
    assert_eq!(operator.dimension(), n);
    let mut actual = vec![0.0; n];
    operator.apply(&x, &mut actual);
    let diagonal = operator.diagonal().unwrap();
    for i in 0..n {
        assert_relative_eq!(actual[i], expected[i], epsilon = 1e-6, max_relative = 1e-9);
        assert_relative_eq!(diagonal[i], matrix.get(i, i), epsilon = 1e-6, max_relative = 1e-9);
    }
}

// ─── FemSolver Tests ──────────────────────────────────────────

#[test]
fn solver_rejects_bad_time_step() {
    let mesh = unit_tetrahedron(1.0);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let solver = FemSolver::new(model, default_updater(), SolverConfig::default()).unwrap();
    let state = solver.model().make_state();
    assert!(solver.advance_one_time_step(&state, 0.0).is_err());
    assert!(solver.advance_one_time_step(&state, -0.1).is_err());
}

#[test]
fn free_fall_is_exact() {
    let mesh = box_mesh(1, 1, 1, DVec3::ONE);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    let g = DVec3::new(0.0, 0.0, -9.81);
    model.set_gravity(g);
    let updater = StateUpdater::acceleration_newmark(NewmarkParameters::default()).unwrap();
    let solver = FemSolver::new(model, updater, SolverConfig::default()).unwrap();

    // Start from the consistent acceleration so Newmark integrates it exactly.
    let dt = 0.01;
    let a0: Vec<f64> = (0..mesh.dof_count()).map(|i| g[i % 3]).collect();
    let mut state = solver.model().make_state().with_accelerations(a0).unwrap();
    for step in 1..=5 {
        let (next, stats) = solver.advance_one_time_step(&state, dt).unwrap();
        assert_eq!(stats.newton_iterations, 0);
        state = next;
        let t = step as f64 * dt;
        for i in 0..state.num_vertices() {
            assert_relative_eq!(state.velocity(i).z, g.z * t, epsilon = 1e-8);
            let drop = state.position(i).z - mesh.vertices[i].z;
            assert_relative_eq!(drop, 0.5 * g.z * t * t, epsilon = 1e-8);
        }
    }
}

#[test]
fn static_solve_without_load_is_immediate() {
    let mesh = box_mesh(1, 1, 1, DVec3::ONE);
    let model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    let solver = FemSolver::new(model, default_updater(), SolverConfig::default()).unwrap();
    let (_, stats) = solver.solve_static(&solver.model().make_state()).unwrap();
    assert_eq!(stats.newton_iterations, 0);
    assert_eq!(stats.cg_iterations, 0);
}

#[test]
fn zeroth_order_step_matches_static_solve() {
    let mesh = box_mesh(2, 2, 2, DVec3::ONE);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    let bottom: Vec<usize> = (0..mesh.vertex_count())
        .filter(|&i| (mesh.vertices[i].z + 0.5).abs() < 1e-12)
        .collect();
    model.set_dirichlet_boundary_condition(clamp(&mesh, &bottom)).unwrap();

    // Stale accelerations must not act as an inertial load.
    let a0: Vec<f64> = (0..mesh.dof_count())
        .map(|i| if i % 3 == 2 { -100.0 } else { 0.0 })
        .collect();
    let solver =
        FemSolver::new(model.clone(), StateUpdater::ZerothOrder, SolverConfig::default()).unwrap();
    let prev = solver.model().make_state().with_accelerations(a0).unwrap();
    let (stepped, stats) = solver.advance_one_time_step(&prev, 0.01).unwrap();
    assert_eq!(stats.newton_iterations, 0);
    for (q, x) in stepped.q().iter().zip(model.reference_positions()) {
        assert_relative_eq!(*q, *x, epsilon = 1e-12);
    }

    // With a load the step lands on the static equilibrium.
    model.set_gravity(DVec3::new(0.0, 0.0, -9.81));
    let solver = FemSolver::new(model, StateUpdater::ZerothOrder, SolverConfig::default()).unwrap();
    let (stepped, _) = solver.advance_one_time_step(&prev, 0.01).unwrap();
    let (settled, _) = solver.solve_static(&prev).unwrap();
    assert!(stepped.q() != solver.model().reference_positions());
    for (a, b) in stepped.q().iter().zip(settled.q()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

fn cantilever_tip_displacement(kind: MaterialModelKind) -> (f64, f64) {
    let (length, side, load) = (1.0, 0.1, 10.0);
    let props = rubber(0.0);
    let mesh = bar(length, side, 10);
    let topology = VolumeTopology::build(&mesh);

    let mut model = FemModel::from_mesh(&mesh, kind, &props).unwrap();
    model
        .set_dirichlet_boundary_condition(clamp(&mesh, &vertices_at_x(&mesh, 0.0)))
        .unwrap();

    // Consistent nodal loads of a uniform traction on the end face.
    let traction = load / (side * side);
    let mut nodal = vec![DVec3::ZERO; mesh.vertex_count()];
    for face in &topology.boundary_faces {
        let [a, b, c] = face.map(|v| mesh.vertices[v]);
        if [a, b, c].iter().all(|p| (p.x - length).abs() < 1e-12) {
            let area = 0.5 * (b - a).cross(c - a).length();
            for &v in face {
                nodal[v].x += traction * area / 3.0;
            }
        }
    }
    let tip = vertices_at_x(&mesh, length);
    for &v in &tip {
        model.set_external_force(v, nodal[v]).unwrap();
    }

    let solver = FemSolver::new(model, default_updater(), SolverConfig::default()).unwrap();
    let (state, _) = solver.solve_static(&solver.model().make_state()).unwrap();
    let displacement = tip
        .iter()
        .map(|&v| state.position(v).x - mesh.vertices[v].x)
        .sum::<f64>()
        / tip.len() as f64;
    let expected = load * length / (props.youngs_modulus * side * side);
    (displacement, expected)
}

#[test]
fn cantilever_linear_matches_analytical() {
    let (actual, expected) = cantilever_tip_displacement(MaterialModelKind::Linear);
    assert!(((actual - expected) / expected).abs() < 1e-3, "{actual} vs {expected}");
}

#[test]
fn cantilever_corotated_matches_analytical() {
    let (actual, expected) = cantilever_tip_displacement(MaterialModelKind::Corotated);
    assert!(((actual - expected) / expected).abs() < 1e-3, "{actual} vs {expected}");
}

/// Mean transverse tip deflection of a clamped square beam under a
/// uniform end shear `load` along +z, with `layers` cells through the
/// thickness and cubic cells along the span.
fn beam_tip_deflection(kind: MaterialModelKind, length: f64, side: f64, layers: usize, load: f64) -> f64 {
    let cells = layers * (length / side).round() as usize;
    let mut mesh = box_mesh(cells, layers, layers, DVec3::new(length, side, side));
    mesh.translate(DVec3::new(0.5 * length, 0.0, 0.0));
    let topology = VolumeTopology::build(&mesh);

    let mut model = FemModel::from_mesh(&mesh, kind, &rubber(0.0)).unwrap();
    model
        .set_dirichlet_boundary_condition(clamp(&mesh, &vertices_at_x(&mesh, 0.0)))
        .unwrap();

    let traction = load / (side * side);
    let mut nodal = vec![DVec3::ZERO; mesh.vertex_count()];
    for face in &topology.boundary_faces {
        let [a, b, c] = face.map(|v| mesh.vertices[v]);
        if [a, b, c].iter().all(|p| (p.x - length).abs() < 1e-12) {
            let area = 0.5 * (b - a).cross(c - a).length();
            for &v in face {
                nodal[v].z += traction * area / 3.0;
            }
        }
    }
    let tip = vertices_at_x(&mesh, length);
    for &v in &tip {
        model.set_external_force(v, nodal[v]).unwrap();
    }

    let solver = FemSolver::new(model, default_updater(), SolverConfig::default()).unwrap();
    let (state, _) = solver.solve_static(&solver.model().make_state()).unwrap();
    tip.iter()
        .map(|&v| state.position(v).z - mesh.vertices[v].z)
        .sum::<f64>()
        / tip.len() as f64
}

#[test]
fn cantilever_bending_matches_beam_theory() {
    let (length, side, load): (f64, f64, f64) = (0.5, 0.1, 1.0);
    let e = rubber(0.0).youngs_modulus;
    let inertia = side.powi(4) / 12.0;
    let bending = load * length.powi(3) / (3.0 * e * inertia);
    // Timoshenko shear term, κ = 5/6 and G = E/2 at ν = 0.
    let shear = load * length / (5.0 / 6.0 * 0.5 * e * side * side);

    let coarse = beam_tip_deflection(MaterialModelKind::Linear, length, side, 4, load);
    let fine = beam_tip_deflection(MaterialModelKind::Linear, length, side, 8, load);

    // Linear tets are too stiff in bending and soften under refinement.
    assert!(0.0 < coarse && coarse < fine, "{coarse} then {fine}");
    assert!(fine < bending + shear, "{fine} vs {}", bending + shear);
    // Eight layers through the thickness land within 5% of PL³/(3EI).
    assert!(((fine - bending) / bending).abs() < 0.05, "{fine} vs {bending}");
    // Second-order Richardson extrapolation lands within 5% of Timoshenko.
    let extrapolated = (4.0 * fine - coarse) / 3.0;
    let timoshenko = bending + shear;
    assert!(
        ((extrapolated - timoshenko) / timoshenko).abs() < 0.05,
        "{extrapolated} vs {timoshenko}"
    );
}

#[test]
fn corotated_bending_matches_linear_for_small_deflection() {
    let (length, side, load) = (0.5, 0.1, 1.0);
    let linear = beam_tip_deflection(MaterialModelKind::Linear, length, side, 4, load);
    let corotated = beam_tip_deflection(MaterialModelKind::Corotated, length, side, 4, load);
    assert!(((corotated - linear) / linear).abs() < 1e-2, "{corotated} vs {linear}");
}

#[test]
fn failed_step_leaves_state_untouched() {
    let mesh = bar(1.0, 0.1, 4);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Corotated, &rubber(0.3)).unwrap();
    model.set_gravity(DVec3::new(0.0, 0.0, -100.0));
    model
        .set_dirichlet_boundary_condition(clamp(&mesh, &vertices_at_x(&mesh, 0.0)))
        .unwrap();
    let config = SolverConfig {
        abs_tolerance: 0.0,
        rel_tolerance: 1e-15,
        max_newton_iterations: 1,
        ..SolverConfig::default()
    };
    let solver = FemSolver::new(model, default_updater(), config).unwrap();
    let prev = solver.model().make_state();
    let before = (prev.q().to_vec(), prev.generation());

    match solver.advance_one_time_step(&prev, 0.05).unwrap_err() {
        PliantError::Convergence { stage, iterations, .. } => {
            assert_eq!(stage, SolverStage::Newton);
            assert_eq!(iterations, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(prev.q(), &before.0[..]);
    assert_eq!(prev.generation(), before.1);
}

#[test]
fn cg_cap_surfaces_as_convergence_error() {
    let mesh = bar(1.0, 0.1, 6);
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &rubber(0.3)).unwrap();
    model.set_gravity(DVec3::new(0.0, 0.0, -9.81));
    model
        .set_dirichlet_boundary_condition(clamp(&mesh, &vertices_at_x(&mesh, 0.0)))
        .unwrap();
    let config = SolverConfig {
        max_cg_iterations: 1,
        ..SolverConfig::default()
    };
    let solver = FemSolver::new(model, default_updater(), config).unwrap();
    let err = solver.solve_static(&solver.model().make_state()).unwrap_err();
    assert!(matches!(
        err,
        PliantError::Convergence { stage: SolverStage::ConjugateGradient, .. }
    ));
}

#[test]
fn damping_dissipates_energy() {
    let mesh = bar(1.0, 0.1, 4);
    let props = MaterialProperties {
        mass_damping: 5.0,
        ..rubber(0.3)
    };
    let mut model = FemModel::from_mesh(&mesh, MaterialModelKind::Linear, &props).unwrap();
    model
        .set_dirichlet_boundary_condition(clamp(&mesh, &vertices_at_x(&mesh, 0.0)))
        .unwrap();
    let solver = FemSolver::new(model, default_updater(), SolverConfig::default()).unwrap();

    let v0: Vec<f64> = (0..mesh.dof_count())
        .map(|i| if i % 3 == 2 { mesh.vertices[i / 3].x } else { 0.0 })
        .collect();
    let mut state = solver.model().make_state().with_velocities(v0).unwrap();
    let kinetic = |s: &FemState| -> f64 {
        s.v()
            .iter()
            .zip(solver.model().lumped_mass())
            .map(|(v, m)| 0.5 * m * v * v)
            .sum()
    };
    let e0 = kinetic(&state);
    for _ in 0..20 {
        state = solver.advance_one_time_step(&state, 0.005).unwrap().0;
    }
    let mut scratch = state.clone();
    let e1 = kinetic(&state) + solver.model().calc_elastic_energy(&mut scratch).unwrap();
    assert!(e1 < e0, "energy grew: {e0} -> {e1}");
}

// ─── Config Tests ─────────────────────────────────────────────

#[test]
fn config_presets() {
    let debug = SolverConfig::debug();
    let accurate = SolverConfig::high_accuracy();
    assert!(debug.max_newton_iterations < accurate.max_newton_iterations);
    assert!(debug.rel_tolerance > accurate.rel_tolerance);
    assert!(debug.validate().is_ok());
    assert!(accurate.validate().is_ok());
    let bad = SolverConfig { max_newton_iterations: 0, ..SolverConfig::default() };
    assert!(bad.validate().is_err());
}

#[test]
fn config_toml_roundtrip() {
    let config = SolverConfig::high_accuracy();
    let text = toml::to_string(&config).unwrap();
    let back: SolverConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, config);

    let params: NewmarkParameters = toml::from_str("beta = 0.3").unwrap();
    assert_eq!(params.beta, 0.3);
    assert_eq!(params.gamma, 0.5);
}
