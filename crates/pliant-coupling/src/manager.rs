//! Deformable/rigid time stepping.
//!
//! Each step:
//! 1. Every deformable body takes a free-motion step (Newton + CG).
//! 2. Contacts between rigid geometry and the free-motion positions are
//!    detected. Rigid/rigid contact belongs to the plant.
//! 3. Without contacts the free motion is committed as is. Otherwise the
//!    velocity-level operator `A_c = (dt / w_v) · T` of each body is
//!    reduced onto the DOFs of its contact vertices with a Schur
//!    complement, the contact-space problem `W = J A_c⁻¹ Jᵀ` (plus the
//!    rigid bodies' share) goes to the contact solver, and the resulting
//!    velocity change is pushed back through the state updater.
//! 4. Energies are evaluated on the end-of-step states.
//! 5. The opposite impulses go to the rigid plant, which then advances.
//!
//! Body states, contact results and counters are committed only after
//! every fallible stage has succeeded, so a failed step leaves them as
//! they were. Telemetry events are buffered and published on commit.

use std::time::Instant;

use faer::Mat;
use pliant_contact::jacobian::{add_rigid_delassus, contact_velocity, deformable_jacobian, find_geometry};
use pliant_contact::{
    ContactDetector, ContactImpulses, ContactPair, ContactProblem, ContactSolver,
    DeformableContactData, RigidGeometry, SchurComplement,
};
use pliant_fem::{FemModel, FemSolver, FemState, StateUpdater, WeightedSum};
use pliant_math::{CsrMatrix, DVec3, FaerSolver, SparseSolver};
use pliant_mesh::VolumeMesh;
use pliant_telemetry::{EventBus, EventKind};
use pliant_types::{BodyId, ElementId, GeometryId, PliantError, PliantResult};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::plant::RigidBodyPlant;
use crate::stepper::TimeStepper;

/// Per-pair contact outcome of the last committed step.
///
/// `impulse` and `force` act on the deformable body (a positive normal
/// component pushes it away from the rigid geometry); the rigid body
/// receives the opposite. `moment` is the moment of `force` about the
/// rigid body origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactResult {
    pub geometry: GeometryId,
    pub body: BodyId,
    pub vertex: usize,
    pub element: ElementId,
    pub point: DVec3,
    pub normal: DVec3,
    pub separation: f64,
    pub impulse: DVec3,
    pub force: DVec3,
    pub moment: DVec3,
}

/// Summary of one committed step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Index of the step that was taken.
    pub step: u64,
    /// Simulation time after the step.
    pub time: f64,
    /// Newton iterations summed over bodies.
    pub newton_iterations: u32,
    /// CG iterations summed over bodies.
    pub cg_iterations: u32,
    pub contact_count: usize,
    pub contact_solver_iterations: u32,
    pub wall_time: f64,
}

struct DeformableBody {
    solver: FemSolver,
    state: FemState,
}

/// One body's contact-space reduction.
struct BodyReduction {
    num_dofs: usize,
    /// Absent when every contact DOF is prescribed.
    schur: Option<SchurComplement>,
    /// `J_p` restricted to the retained DOFs (3k × p).
    jacobian: Mat<f64>,
    /// `D⁻¹ J_pᵀ` (p × 3k).
    response: Mat<f64>,
}

impl BodyReduction {
    fn new(
        model: &FemModel,
        state: &mut FemState,
        weights: &WeightedSum,
        scale: f64,
        data: &DeformableContactData,
        jacobian: &CsrMatrix,
    ) -> PliantResult<Self> {
        let rows = 3 * data.num_contacts();
        let num_dofs = model.num_dofs();
        let dirichlet = model.dirichlet_boundary_condition();
        let participating: Vec<usize> = data
            .participating_vertices()
            .into_iter()
            .flat_map(|v| (0..3).map(move |d| 3 * v + d))
            .filter(|&dof| !dirichlet.is_constrained(dof))
            .collect();

        if participating.is_empty() {
            return Ok(Self {
                num_dofs,
                schur: None,
                jacobian: Mat::zeros(rows, 0),
                response: Mat::zeros(0, rows),
            });
        }

        let mut tangent = model.calc_tangent_matrix(state, weights)?;
        tangent.scale(scale);
        let schur = SchurComplement::new(&tangent, &participating)?;

        let all_rows: Vec<usize> = (0..rows).collect();
        let jp = jacobian.submatrix(&all_rows, schur.retained()).to_dense();

        let mut reduced = FaerSolver::new();
        reduced
            .factorize(&CsrMatrix::from_dense(schur.complement()))
            .map_err(|e| {
                PliantError::ContactConsistency(format!("reduced contact operator is not SPD: {e}"))
            })?;

        let p = schur.retained().len();
        let mut response = Mat::<f64>::zeros(p, rows);
        let mut column = vec![0.0; p];
        let mut solved = vec![0.0; p];
        for r in 0..rows {
            for (i, value) in column.iter_mut().enumerate() {
                *value = jp[(r, i)];
            }
            reduced.solve(&column, &mut solved)?;
            for (i, &value) in solved.iter().enumerate() {
                response[(i, r)] = value;
            }
        }

        Ok(Self {
            num_dofs,
            schur: Some(schur),
            jacobian: jp,
            response,
        })
    }

    /// Adds `J_p D⁻¹ J_pᵀ` at `offset` on the diagonal of `delassus`.
    fn add_delassus(&self, delassus: &mut Mat<f64>, offset: usize) {
        let rows = self.jacobian.nrows();
        let p = self.jacobian.ncols();
        for r in 0..rows {
            for c in 0..rows {
                let mut sum = 0.0;
                for i in 0..p {
                    sum += self.jacobian[(r, i)] * self.response[(i, c)];
                }
                delassus[(offset + r, offset + c)] += sum;
            }
        }
    }

    /// Full-space velocity change caused by contact impulses `gamma`.
    fn velocity_change(&self, gamma: &[f64]) -> PliantResult<Vec<f64>> {
        let mut dv = vec![0.0; self.num_dofs];
        let Some(schur) = &self.schur else {
            return Ok(dv);
        };
        let retained: Vec<f64> = (0..schur.retained().len())
            .map(|i| {
                gamma
                    .iter()
                    .enumerate()
                    .map(|(c, g)| self.response[(i, c)] * g)
                    .sum()
            })
            .collect();
        let eliminated = schur.back_substitute(&vec![0.0; schur.eliminated().len()], &retained)?;

        for (&dof, &value) in schur.retained().iter().zip(&retained) {
            dv[dof] = value;
        }
        for (&dof, &value) in schur.eliminated().iter().zip(&eliminated) {
            dv[dof] = value;
        }
        Ok(dv)
    }
}

/// Couples deformable FEM bodies with a rigid-body plant through contact.
pub struct DeformableRigidManager<P: RigidBodyPlant> {
    config: SimulationConfig,
    updater: StateUpdater,
    bodies: Vec<DeformableBody>,
    detector: ContactDetector,
    contact_solver: Box<dyn ContactSolver>,
    plant: P,
    bus: EventBus,
    time: f64,
    step: u64,
    contact_results: Vec<ContactResult>,
}

impl<P: RigidBodyPlant> DeformableRigidManager<P> {
    /// Creates a manager using the reference contact solver from `config`.
    ///
    /// # Errors
    /// `InvalidConfig` for an invalid config (including a zeroth-order
    /// scheme) or invalid plant geometry.
    pub fn new(config: SimulationConfig, plant: P) -> PliantResult<Self> {
        config.validate()?;
        for geometry in plant.geometries() {
            geometry.validate()?;
        }
        let updater = config.state_updater()?;
        let detector = ContactDetector::new(config.contact.proximity_margin)?;
        let contact_solver = Box::new(config.contact.contact_solver());
        Ok(Self {
            config,
            updater,
            bodies: Vec::new(),
            detector,
            contact_solver,
            plant,
            bus: EventBus::new(),
            time: 0.0,
            step: 0,
            contact_results: Vec::new(),
        })
    }

    /// Replaces the contact solver.
    pub fn with_contact_solver(mut self, solver: Box<dyn ContactSolver>) -> Self {
        self.contact_solver = solver;
        self
    }

    /// Registers a body built from `mesh` with the configured material
    /// and gravity.
    pub fn register_deformable_body(&mut self, mesh: &VolumeMesh) -> PliantResult<BodyId> {
        let mut model = FemModel::from_mesh(mesh, self.config.model, &self.config.material)?;
        model.set_gravity(self.config.gravity);
        self.register_deformable_model(mesh, model)
    }

    /// Registers a prepared model (own material, loads, Dirichlet
    /// conditions). `mesh` supplies the collision topology and must be
    /// the mesh the model was built from.
    pub fn register_deformable_model(
        &mut self,
        mesh: &VolumeMesh,
        model: FemModel,
    ) -> PliantResult<BodyId> {
        if model.num_vertices() != mesh.vertex_count()
            || model.num_elements() != mesh.element_count()
        {
            return Err(PliantError::InvalidConfig(format!(
                "model has {} vertices and {} elements, mesh has {} and {}",
                model.num_vertices(),
                model.num_elements(),
                mesh.vertex_count(),
                mesh.element_count()
            )));
        }
        let solver = FemSolver::new(model, self.updater, self.config.solver)?;
        let mut state = solver.model().make_state();
        solver.model().apply_boundary_condition(&mut state);

        let id = self.detector.register_deformable_body(mesh);
        debug_assert_eq!(id.index(), self.bodies.len());
        self.bodies.push(DeformableBody { solver, state });
        tracing::debug!(body = id.0, dofs = mesh.dof_count(), "registered deformable body");
        Ok(id)
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    fn body(&self, id: BodyId) -> PliantResult<&DeformableBody> {
        self.bodies
            .get(id.index())
            .ok_or_else(|| PliantError::InvalidConfig(format!("unknown deformable body {}", id.0)))
    }

    fn body_mut(&mut self, id: BodyId) -> PliantResult<&mut DeformableBody> {
        self.bodies
            .get_mut(id.index())
            .ok_or_else(|| PliantError::InvalidConfig(format!("unknown deformable body {}", id.0)))
    }

    /// Committed state of a body.
    pub fn state(&self, id: BodyId) -> PliantResult<&FemState> {
        Ok(&self.body(id)?.state)
    }

    /// Overwrites the committed state of a body.
    pub fn set_state(&mut self, id: BodyId, state: FemState) -> PliantResult<()> {
        let body = self.body_mut(id)?;
        let model = body.solver.model();
        if state.num_dofs() != model.num_dofs() {
            return Err(PliantError::InvalidConfig(format!(
                "state has {} DOFs, body {} has {}",
                state.num_dofs(),
                id.0,
                model.num_dofs()
            )));
        }
        if state.num_elements() != model.num_elements() {
            return Err(PliantError::InvalidConfig(format!(
                "state caches {} elements, body {} has {}",
                state.num_elements(),
                id.0,
                model.num_elements()
            )));
        }
        body.state = state;
        Ok(())
    }

    pub fn model(&self, id: BodyId) -> PliantResult<&FemModel> {
        Ok(self.body(id)?.solver.model())
    }

    /// Mutable model access for loads and boundary conditions.
    pub fn model_mut(&mut self, id: BodyId) -> PliantResult<&mut FemModel> {
        Ok(self.body_mut(id)?.solver.model_mut())
    }

    pub fn plant(&self) -> &P {
        &self.plant
    }

    pub fn plant_mut(&mut self) -> &mut P {
        &mut self.plant
    }

    pub fn event_bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn contact_solver_name(&self) -> &str {
        self.contact_solver.name()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Contact results of the last committed step.
    pub fn calc_contact_results(&self) -> Vec<ContactResult> {
        self.contact_results.clone()
    }

    /// Advances every body and the plant by `dt`.
    ///
    /// # Errors
    /// Any free-motion, contact or plant failure. Deformable states,
    /// time and contact results are left untouched on error.
    pub fn advance_one_time_step(&mut self, dt: f64) -> PliantResult<StepReport> {
        let step = self.step;
        match self.try_advance(dt) {
            Ok((report, events)) => {
                for kind in events {
                    self.bus.emit_kind(step, kind);
                }
                self.bus.flush();
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(step, error = %err, "time step failed");
                Err(err)
            }
        }
    }

    /// Advances by the configured time step.
    pub fn step(&mut self) -> PliantResult<StepReport> {
        self.advance_one_time_step(self.config.dt)
    }

    /// Runs one step on candidate states. Every fallible computation
    /// happens before the commit, so an error leaves bodies, contact
    /// results and counters as they were. Events are returned for the
    /// caller to publish once the step has committed.
    fn try_advance(&mut self, dt: f64) -> PliantResult<(StepReport, Vec<EventKind>)> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(PliantError::InvalidConfig(format!(
                "time step must be positive, got {dt}"
            )));
        }
        let start = Instant::now();
        let mut events = vec![EventKind::TimestepBegin {
            sim_time: self.time,
            dt,
        }];
        let mut report = StepReport {
            step: self.step,
            ..Default::default()
        };

        // (1) Free motion.
        let mut free = Vec::with_capacity(self.bodies.len());
        for (b, body) in self.bodies.iter().enumerate() {
            let (state, stats) = body.solver.advance_one_time_step(&body.state, dt)?;
            events.push(EventKind::Convergence {
                body: b as u32,
                newton_iterations: stats.newton_iterations,
                cg_iterations: stats.cg_iterations,
                initial_residual: stats.initial_residual,
                final_residual: stats.final_residual,
            });
            report.newton_iterations += stats.newton_iterations;
            report.cg_iterations += stats.cg_iterations;
            free.push(state);
        }

        // (2) Discovery.
        let geometries = self.plant.geometries().to_vec();
        let mut contacts = Vec::with_capacity(free.len());
        for (b, state) in free.iter().enumerate() {
            let data = self
                .detector
                .detect(BodyId(b as u32), state.q(), &geometries)?;
            events.push(EventKind::ContactDetection {
                body: b as u32,
                contact_count: data.num_contacts() as u32,
                max_penetration: data.max_penetration(),
            });
            contacts.push(data);
        }
        report.contact_count = contacts.iter().map(DeformableContactData::num_contacts).sum();

        // (3) Resolution.
        let results = if report.contact_count == 0 {
            Vec::new()
        } else {
            let (results, impulses) =
                self.resolve_contacts(dt, &mut free, &contacts, &geometries)?;
            report.contact_solver_iterations = impulses.iterations;
            events.push(EventKind::ContactSolve {
                contact_count: report.contact_count as u32,
                iterations: impulses.iterations,
                total_normal_impulse: impulses.impulses.iter().map(|g| g.z).sum(),
            });
            results
        };

        // (4) Energies of the end-of-step states.
        for (b, (body, state)) in self.bodies.iter().zip(free.iter_mut()).enumerate() {
            let model = body.solver.model();
            let kinetic = 0.5
                * model
                    .lumped_mass()
                    .iter()
                    .zip(state.v())
                    .map(|(m, v)| m * v * v)
                    .sum::<f64>();
            let elastic = model.calc_elastic_energy(state)?;
            events.push(EventKind::Energy {
                body: b as u32,
                kinetic,
                elastic,
            });
        }

        // (5) Rigid side. A plant error still leaves the deformable side
        // at the start of the step.
        for result in &results {
            self.plant
                .apply_contact_impulse(result.geometry, result.point, -result.impulse)?;
        }
        self.plant.advance(dt)?;

        // (6) Commit.
        for (body, state) in self.bodies.iter_mut().zip(free) {
            body.state = state;
        }
        self.contact_results = results;
        self.time += dt;
        self.step += 1;

        report.time = self.time;
        report.wall_time = start.elapsed().as_secs_f64();
        events.push(EventKind::TimestepEnd {
            wall_time: report.wall_time,
        });
        tracing::info!(
            step = report.step,
            time = self.time,
            contacts = report.contact_count,
            newton_iterations = report.newton_iterations,
            "time step"
        );
        Ok((report, events))
    }

    /// Builds and solves the contact-space problem, then applies the
    /// velocity corrections to the free-motion states.
    fn resolve_contacts(
        &self,
        dt: f64,
        free: &mut [FemState],
        contacts: &[DeformableContactData],
        geometries: &[RigidGeometry],
    ) -> PliantResult<(Vec<ContactResult>, ContactImpulses)> {
        let weights = self.updater.weights(dt);
        if !(weights.w_v > 0.0) {
            return Err(PliantError::InvalidConfig(
                "contact coupling needs a scheme with a velocity weight".into(),
            ));
        }
        let scale = dt / weights.w_v;

        let pairs: Vec<ContactPair> = contacts
            .iter()
            .flat_map(|data| data.pairs.iter().cloned())
            .collect();
        let k = pairs.len();
        let mut delassus = Mat::<f64>::zeros(3 * k, 3 * k);
        let mut free_velocity = vec![0.0; 3 * k];
        let mut reductions = Vec::with_capacity(contacts.len());

        let mut offset = 0;
        for ((data, body), state) in contacts.iter().zip(&self.bodies).zip(free.iter_mut()) {
            if data.is_empty() {
                reductions.push(None);
                continue;
            }
            let model = body.solver.model();
            let jacobian = deformable_jacobian(&data.pairs, model)?;
            let velocity = contact_velocity(&data.pairs, &jacobian, state.v(), geometries)?;
            free_velocity[3 * offset..3 * offset + velocity.len()].copy_from_slice(&velocity);

            let reduction = BodyReduction::new(model, state, &weights, scale, data, &jacobian)?;
            reduction.add_delassus(&mut delassus, 3 * offset);
            reductions.push(Some(reduction));
            offset += data.num_contacts();
        }
        add_rigid_delassus(&pairs, geometries, &mut delassus)?;

        let problem = ContactProblem {
            delassus,
            free_velocity,
            bias: pairs.iter().map(|pair| pair.separation / dt).collect(),
            friction: vec![self.config.contact.friction_coefficient; k],
        };
        let impulses = self.contact_solver.solve(&problem)?;
        if impulses.impulses.len() != k {
            return Err(PliantError::ContactConsistency(format!(
                "{} returned {} impulses for {k} contacts",
                self.contact_solver.name(),
                impulses.impulses.len()
            )));
        }

        let mut offset = 0;
        for ((data, reduction), state) in contacts.iter().zip(&reductions).zip(free.iter_mut()) {
            let Some(reduction) = reduction else {
                continue;
            };
            let count = data.num_contacts();
            let gamma: Vec<f64> = impulses.impulses[offset..offset + count]
                .iter()
                .flat_map(|g| g.to_array())
                .collect();
            let dz: Vec<f64> = reduction
                .velocity_change(&gamma)?
                .into_iter()
                .map(|dv| dv / weights.w_v)
                .collect();
            self.updater.update_state(state, &dz, dt)?;
            offset += count;
        }

        let results = pairs
            .iter()
            .zip(&impulses.impulses)
            .map(|(pair, gamma)| {
                let origin = find_geometry(geometries, pair.geometry)?.pose.translation;
                let impulse = pair.to_world(*gamma);
                let force = impulse / dt;
                Ok(ContactResult {
                    geometry: pair.geometry,
                    body: pair.body,
                    vertex: pair.vertex,
                    element: pair.element,
                    point: pair.point,
                    normal: pair.normal(),
                    separation: pair.separation,
                    impulse,
                    force,
                    moment: (pair.point - origin).cross(force),
                })
            })
            .collect::<PliantResult<Vec<_>>>()?;

        Ok((results, impulses))
    }
}

impl<P: RigidBodyPlant> TimeStepper for DeformableRigidManager<P> {
    fn time(&self) -> f64 {
        self.time
    }

    fn advance(&mut self, dt: f64) -> PliantResult<()> {
        self.advance_one_time_step(dt).map(|_| ())
    }
}
