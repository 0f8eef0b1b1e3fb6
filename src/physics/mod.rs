//! Contact resolution pipeline over ECS representations.
//!
//! # Architecture
//!
//! One physics step runs on pose intervals spanning `[0, dt]`:
//!
//! 1. Predict free motion (gravity, velocities)
//! 2. Broadphase over swept bounds
//! 3. Discrete detection on discrete pairs at the end of the step
//! 4. Resolve discrete contacts (constraints, MLCP build, solve, push)
//! 5. Continuous sub-stepping loop on continuous pairs
//!
//! Steps 3 to 5 are available on their own through [`PhysicsWorld::step`] for callers that
//! produce their own intervals and pairs.

pub mod broadphase;
pub mod ccd_loop;
pub mod constraint;
pub mod detection;
pub mod mlcp;
pub mod push;
pub mod representation;
pub mod rigid_body;
pub mod solver;

use glam::DVec3;
use tracing::{debug, warn};

use crate::collision::calculator::ContactCalculatorRegistry;
use crate::collision::contact::{CollisionPair, DetectionType};
use crate::error::{PhysicsError, PhysicsResult};

use self::broadphase::SweepAndPrune;
use self::ccd_loop::{CcdCollisionLoop, CcdLoopConfig, CcdLoopReport};
use self::constraint::generate_constraints;
use self::detection::detect_discrete;
use self::mlcp::build_mlcp;
use self::push::push_results;
use self::solver::{GaussSeidelConfig, GaussSeidelSolver, MlcpSolver};

/// Configuration for the physics step.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -9.81, 0).
    pub gravity: DVec3,
    /// Fixed timestep for physics updates in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 4.
    pub max_substeps: u32,
    /// Separation the contact solver aims for beyond touching. Default: 1e-4.
    pub contact_tolerance: f64,
    /// Whether discrete contacts are resolved or only reported. Default: true.
    pub resolve_discrete: bool,
    /// Continuous sub-stepping. Default: 20 iterations, epsilon factor 100.
    pub ccd: CcdLoopConfig,
    /// Default MLCP solver. Default: 100 sweeps, precision 1e-8.
    pub solver: GaussSeidelConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: DVec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            contact_tolerance: 1e-4,
            resolve_discrete: true,
            ccd: CcdLoopConfig::default(),
            solver: GaussSeidelConfig::default(),
        }
    }
}

/// Build, solve and push the contact problem for every contact currently held by `pairs`.
///
/// Returns the number of constraint rows solved.
pub fn resolve_contacts<'p>(
    world: &mut hecs::World,
    pairs: impl IntoIterator<Item = &'p CollisionPair>,
    dt: f64,
    solver: &dyn MlcpSolver,
    contact_tolerance: f64,
) -> PhysicsResult<usize> {
    let constraints = generate_constraints(pairs);
    if constraints.is_empty() {
        return Ok(0);
    }
    let problem = build_mlcp(world, &constraints, dt, contact_tolerance)?;
    let solution = solver.solve(&problem)?;
    push_results(world, &problem, &solution, dt);
    debug!(rows = problem.len(), iterations = solution.iterations, "contacts resolved");
    Ok(problem.len())
}

/// Outcome of one [`PhysicsWorld::step`].
#[derive(Debug)]
pub struct StepReport {
    /// Contacts found by the discrete pass.
    pub discrete_contacts: usize,
    /// Failure while resolving discrete contacts, if any. The state is left as predicted.
    pub discrete_error: Option<PhysicsError>,
    pub ccd: CcdLoopReport,
}

/// Collision pipeline with its calculators, solver and frame accumulator.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    registry: ContactCalculatorRegistry,
    solver: Box<dyn MlcpSolver>,
    broadphase: SweepAndPrune,
    accumulator: f64,
}

impl PhysicsWorld {
    /// Create a physics world with every built-in calculator and the Gauss-Seidel solver.
    pub fn new(config: PhysicsConfig) -> PhysicsResult<Self> {
        let registry = ContactCalculatorRegistry::with_defaults()?;
        let solver = Box::new(GaussSeidelSolver::new(config.solver));
        Ok(Self {
            config,
            registry,
            solver,
            broadphase: SweepAndPrune::new(),
            accumulator: 0.0,
        })
    }

    /// Replace the calculator registry.
    pub fn with_registry(mut self, registry: ContactCalculatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the MLCP solver.
    pub fn with_solver(mut self, solver: impl MlcpSolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn registry(&self) -> &ContactCalculatorRegistry {
        &self.registry
    }

    /// Detect and resolve contacts for one step of length `dt` whose intervals are already set.
    ///
    /// Contacts of discrete pairs stay on the pairs after the step, resolved or not.
    pub fn step(
        &self,
        world: &mut hecs::World,
        pairs: &mut [CollisionPair],
        dt: f64,
    ) -> StepReport {
        // 1. Discrete detection at the end of the step
        let discrete_contacts = detect_discrete(world, &self.registry, pairs, 1.0);

        // 2. Resolve discrete contacts
        let mut discrete_error = None;
        if self.config.resolve_discrete && discrete_contacts > 0 {
            let discrete = pairs
                .iter()
                .filter(|pair| pair.detection() == DetectionType::Discrete);
            if let Err(err) = resolve_contacts(
                world,
                discrete,
                dt,
                self.solver.as_ref(),
                self.config.contact_tolerance,
            ) {
                warn!(%err, "discrete contact resolution failed");
                discrete_error = Some(err);
            }
        }

        // 3. Continuous sub-stepping
        let ccd = CcdCollisionLoop::new(
            self.config.ccd,
            &self.registry,
            self.solver.as_ref(),
            self.config.contact_tolerance,
        )
        .run(world, pairs, dt);

        StepReport {
            discrete_contacts,
            discrete_error,
            ccd,
        }
    }

    /// Advance the simulation by `delta_time` seconds in fixed steps.
    ///
    /// Uses a fixed timestep accumulator; returns the report of every step taken.
    pub fn advance_frame(
        &mut self,
        world: &mut hecs::World,
        delta_time: f64,
    ) -> Vec<StepReport> {
        self.accumulator += delta_time;

        let mut reports = Vec::new();
        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep
            && substeps < self.config.max_substeps
        {
            reports.push(self.fixed_step(world, self.config.fixed_timestep));
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            self.accumulator = 0.0;
        }
        reports
    }

    fn fixed_step(&self, world: &mut hecs::World, dt: f64) -> StepReport {
        rigid_body::integrate_free_motion(world, self.config.gravity, dt);
        let mut pairs = self.broadphase.find_pairs(world);
        self.step(world, &mut pairs, dt)
    }
}
