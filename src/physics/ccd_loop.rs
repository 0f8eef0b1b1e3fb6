//! Continuous collision sub-stepping.
//!
//! Each iteration advances every representation to the last impact, detects continuous
//! contacts over what remains of the step, keeps only the earliest ones and resolves them.
//! The loop ends when nothing more collides, the step is consumed, the iteration budget runs
//! out or the solver fails. None of these is an error for the caller.

use tracing::{debug, trace, warn};

use crate::collision::calculator::ContactCalculatorRegistry;
use crate::collision::contact::{CollisionPair, DetectionType};
use crate::error::PhysicsResult;

use super::detection::detect_continuous;
use super::representation::advance;
use super::resolve_contacts;
use super::solver::MlcpSolver;

/// Configuration for [`CcdCollisionLoop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdLoopConfig {
    /// Maximum number of detect/resolve iterations per step. Default: 20.
    pub max_iterations: usize,
    /// Contacts later than the earliest impact by up to `1 / ((1 - toi) * epsilon_factor)`
    /// are resolved together. Default: 100.
    pub epsilon_factor: f64,
}

impl Default for CcdLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            epsilon_factor: 100.0,
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcdTermination {
    /// No continuous contact left in the remaining interval.
    NoImpact,
    /// The accumulated time of impact reached the end of the step.
    StepConsumed,
    /// The iteration budget ran out with impacts left.
    IterationLimit,
    /// Building or solving the contact problem failed; the last state is kept.
    SolverFailure,
}

/// Outcome of one run of the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcdLoopReport {
    pub iterations: usize,
    /// Fraction of the step consumed by resolved impacts.
    pub time_of_impact: f64,
    pub termination: CcdTermination,
}

fn is_continuous(pair: &&CollisionPair) -> bool {
    pair.detection() == DetectionType::Continuous
}

fn continuous_pairs_mut(
    pairs: &mut [CollisionPair],
) -> impl Iterator<Item = &mut CollisionPair> {
    pairs
        .iter_mut()
        .filter(|pair| pair.detection() == DetectionType::Continuous)
}

/// Earliest time of impact over every contact of every continuous pair.
pub fn find_earliest_contact(pairs: &[CollisionPair]) -> Option<f64> {
    pairs
        .iter()
        .filter(is_continuous)
        .flat_map(|pair| pair.contacts())
        .filter_map(|contact| contact.time)
        .filter(|time| time.is_finite())
        .min_by(f64::total_cmp)
}

/// Drop every contact of a continuous pair with a time of impact after `threshold`, or
/// without one. Discrete pairs keep their contacts.
pub fn filter_later_contacts(pairs: &mut [CollisionPair], threshold: f64) {
    for pair in continuous_pairs_mut(pairs) {
        pair.retain_contacts(|contact| contact.time.is_some_and(|time| time <= threshold));
    }
}

/// Keep the contacts within `epsilon` of the earliest impact and return that impact time.
///
/// Returns `None`, leaving the pairs untouched, when no contact carries a time of impact.
pub fn filter_contacts(pairs: &mut [CollisionPair], epsilon: f64) -> Option<f64> {
    let earliest = find_earliest_contact(pairs)?;
    filter_later_contacts(pairs, earliest + epsilon);
    Some(earliest)
}

fn clear_continuous_contacts(pairs: &mut [CollisionPair]) {
    for pair in continuous_pairs_mut(pairs) {
        pair.clear_contacts();
    }
}

/// The sub-stepping loop over continuous pairs.
pub struct CcdCollisionLoop<'a> {
    pub config: CcdLoopConfig,
    registry: &'a ContactCalculatorRegistry,
    solver: &'a dyn MlcpSolver,
    contact_tolerance: f64,
}

impl<'a> CcdCollisionLoop<'a> {
    pub fn new(
        config: CcdLoopConfig,
        registry: &'a ContactCalculatorRegistry,
        solver: &'a dyn MlcpSolver,
        contact_tolerance: f64,
    ) -> Self {
        Self {
            config,
            registry,
            solver,
            contact_tolerance,
        }
    }

    fn resolve(
        &self,
        world: &mut hecs::World,
        pairs: &[CollisionPair],
        dt: f64,
    ) -> PhysicsResult<usize> {
        let continuous = pairs.iter().filter(is_continuous);
        resolve_contacts(world, continuous, dt, self.solver, self.contact_tolerance)
    }

    /// Run the loop over the continuous pairs in `pairs` for a step of length `dt`.
    ///
    /// Every pose interval and deformable state is treated as spanning the step; on return
    /// their start sits at the last resolved impact. Discrete pairs are left untouched.
    pub fn run(
        &self,
        world: &mut hecs::World,
        pairs: &mut [CollisionPair],
        dt: f64,
    ) -> CcdLoopReport {
        let mut report = CcdLoopReport {
            iterations: 0,
            time_of_impact: 0.0,
            termination: CcdTermination::NoImpact,
        };
        let mut local_toi = 0.0;

        loop {
            if report.iterations >= self.config.max_iterations {
                warn!(
                    iterations = report.iterations,
                    time_of_impact = report.time_of_impact,
                    "ccd loop hit its iteration limit"
                );
                report.termination = CcdTermination::IterationLimit;
                break;
            }
            report.iterations += 1;

            let epsilon = 1.0 / ((1.0 - report.time_of_impact) * self.config.epsilon_factor);

            advance(world, local_toi);
            detect_continuous(world, self.registry, pairs);

            let Some(earliest) = filter_contacts(pairs, epsilon) else {
                report.termination = CcdTermination::NoImpact;
                break;
            };
            local_toi = earliest;
            report.time_of_impact += (1.0 - report.time_of_impact) * local_toi;
            trace!(
                iteration = report.iterations,
                local_toi,
                time_of_impact = report.time_of_impact,
                epsilon,
                "ccd impact"
            );

            if let Err(err) = self.resolve(world, pairs, dt) {
                warn!(%err, iteration = report.iterations, "ccd contact resolution failed");
                clear_continuous_contacts(pairs);
                report.termination = CcdTermination::SolverFailure;
                break;
            }
            clear_continuous_contacts(pairs);

            if report.time_of_impact >= 1.0 {
                report.termination = CcdTermination::StepConsumed;
                break;
            }
        }

        debug!(
            iterations = report.iterations,
            time_of_impact = report.time_of_impact,
            termination = ?report.termination,
            "ccd loop"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::calculator::{ContactCalculator, PosedInterval, PosedShape};
    use crate::collision::contact::Contact;
    use crate::collision::location::Location;
    use crate::collision::pool::ShapePool;
    use crate::ecs::components::{Collider, DeformableBody, PoseInterval, RigidBody};
    use crate::physics::solver::GaussSeidelSolver;
    use crate::shapes::{MeshShape, SegmentMeshShape, Shape, ShapeKind};
    use glam::{DAffine3, DVec3};

    fn timed_contact(time: f64) -> Contact {
        Contact::continuous(
            time,
            0.0,
            DVec3::ZERO,
            DVec3::Y,
            (Location::default(), Location::default()),
        )
    }

    fn pair_with_times(world: &mut hecs::World, times: &[f64]) -> CollisionPair {
        let mut pair = CollisionPair::new(
            world.spawn(()),
            world.spawn(()),
            DetectionType::Continuous,
        );
        pair.set_contacts(times.iter().map(|&t| timed_contact(t)).collect());
        pair
    }

    fn total_contacts(pairs: &[CollisionPair]) -> usize {
        pairs.iter().map(|pair| pair.contacts().len()).sum()
    }

    #[test]
    fn test_filter_keeps_earliest_only() {
        let mut world = hecs::World::new();
        let mut pairs = vec![
            pair_with_times(&mut world, &[0.3, 0.1]),
            pair_with_times(&mut world, &[0.2]),
        ];
        assert_eq!(find_earliest_contact(&pairs), Some(0.1));
        assert_eq!(filter_contacts(&mut pairs, 0.0), Some(0.1));
        assert_eq!(total_contacts(&pairs), 1);
        assert_eq!(pairs[0].contacts()[0].time, Some(0.1));
    }

    #[test]
    fn test_filter_with_epsilon_window() {
        let mut world = hecs::World::new();
        let mut pairs = vec![pair_with_times(&mut world, &[0.1, 0.2, 0.3])];
        assert_eq!(filter_contacts(&mut pairs, 0.11), Some(0.1));
        assert_eq!(total_contacts(&pairs), 2);
        assert!(pairs[0].contacts().iter().all(|c| c.time != Some(0.3)));
    }

    #[test]
    fn test_filter_leaves_discrete_pairs_alone() {
        let mut world = hecs::World::new();
        let mut discrete =
            CollisionPair::new(world.spawn(()), world.spawn(()), DetectionType::Discrete);
        discrete.set_contacts(vec![Contact::discrete(
            0.1,
            DVec3::ZERO,
            DVec3::Y,
            (Location::default(), Location::default()),
        )]);
        let mut pairs = vec![discrete, pair_with_times(&mut world, &[0.4, 0.9])];

        assert_eq!(filter_contacts(&mut pairs, 0.0), Some(0.4));
        assert_eq!(pairs[0].contacts().len(), 1);
        assert_eq!(pairs[1].contacts().len(), 1);

        clear_continuous_contacts(&mut pairs);
        assert_eq!(pairs[0].contacts().len(), 1);
        assert!(!pairs[1].has_contacts());
    }

    #[test]
    fn test_filter_without_contacts() {
        let mut world = hecs::World::new();
        let mut pairs = vec![pair_with_times(&mut world, &[])];
        assert_eq!(filter_contacts(&mut pairs, 0.5), None);
    }

    fn triangle() -> Shape {
        Shape::Mesh(
            MeshShape::new(
                vec![
                    DVec3::new(-1.0, 0.0, -1.0),
                    DVec3::new(1.0, 0.0, -1.0),
                    DVec3::new(0.0, 0.0, 1.0),
                ],
                vec![[0, 2, 1]],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_loop_without_impact_leaves_state_unchanged() {
        let mut world = hecs::World::new();
        let poses = PoseInterval::new(
            DAffine3::from_translation(DVec3::new(0.0, 3.0, 0.0)),
            DAffine3::from_translation(DVec3::new(0.0, 2.0, 0.0)),
        );
        let falling = world.spawn((
            Collider::continuous(triangle()),
            poses,
            RigidBody::new_dynamic(1.0),
        ));
        let floor = world.spawn((
            Collider::continuous(triangle()),
            PoseInterval::default(),
            RigidBody::new_static(),
        ));
        let mut pairs = vec![CollisionPair::new(falling, floor, DetectionType::Continuous)];

        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let solver = GaussSeidelSolver::default();
        let ccd = CcdCollisionLoop::new(CcdLoopConfig::default(), &registry, &solver, 1e-4);
        let report = ccd.run(&mut world, &mut pairs, 1.0 / 60.0);

        assert_eq!(report.iterations, 1);
        assert_eq!(report.termination, CcdTermination::NoImpact);
        assert_eq!(report.time_of_impact, 0.0);
        assert_eq!(*world.get::<&PoseInterval>(falling).unwrap(), poses);
    }

    #[test]
    fn test_loop_resolves_falling_triangle() {
        let mut world = hecs::World::new();
        let falling = world.spawn((
            Collider::continuous(triangle()),
            PoseInterval::new(
                DAffine3::from_translation(DVec3::new(0.0, 1.0, 0.0)),
                DAffine3::from_translation(DVec3::new(0.0, -1.0, 0.0)),
            ),
            RigidBody::new_dynamic(1.0).with_inertia(DVec3::ZERO),
        ));
        let floor = world.spawn((
            Collider::continuous(triangle()),
            PoseInterval::default(),
            RigidBody::new_static(),
        ));
        let mut pairs = vec![CollisionPair::new(falling, floor, DetectionType::Continuous)];

        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let solver = GaussSeidelSolver::default();
        let ccd = CcdCollisionLoop::new(CcdLoopConfig::default(), &registry, &solver, 1e-4);
        let report = ccd.run(&mut world, &mut pairs, 1.0);

        let eps = 1e-6;
        assert!((report.time_of_impact - 0.5).abs() < eps, "toi = {}", report.time_of_impact);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.termination, CcdTermination::NoImpact);

        let y = world.get::<&PoseInterval>(falling).unwrap().current.translation.y;
        assert!(y >= 0.0, "triangle ended below the floor: y = {y}");
        assert!((y - 1e-4).abs() < eps, "y = {y}");
        assert!(!pairs[0].has_contacts());
    }

    #[test]
    fn test_loop_resolves_strand_folding_onto_itself() {
        let mut world = hecs::World::new();
        // The last segment falls through the first one; the first segment is pinned
        let rest = vec![
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, -1.0),
            DVec3::new(0.0, 1.0, 1.0),
        ];
        let strand = Shape::SegmentMesh(SegmentMeshShape::polyline(rest.clone(), 0.1));
        let mut body = DeformableBody::new(rest, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        body.current[2].y = -1.0;
        body.current[3].y = -1.0;
        let entity = world.spawn((Collider::continuous(strand).with_self_collision(), body));
        let mut pairs = vec![CollisionPair::new(entity, entity, DetectionType::Continuous)];

        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let solver = GaussSeidelSolver::default();
        let ccd = CcdCollisionLoop::new(CcdLoopConfig::default(), &registry, &solver, 1e-4);
        let report = ccd.run(&mut world, &mut pairs, 1.0);

        let eps = 1e-6;
        assert!((report.time_of_impact - 0.4).abs() < eps, "toi = {}", report.time_of_impact);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.termination, CcdTermination::NoImpact);

        let body = world.get::<&DeformableBody>(entity).unwrap();
        assert_eq!(body.current[0], DVec3::new(-1.0, 0.0, 0.0));
        for node in &body.current[2..] {
            // Resting on the pinned segment: both radii plus the contact tolerance
            assert!((node.y - 0.2001).abs() < eps, "node = {node}");
        }
    }

    /// Reports an impact halfway through whatever interval it is given.
    struct AlwaysHalfway;

    impl ContactCalculator for AlwaysHalfway {
        fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
            (ShapeKind::Sphere, ShapeKind::Sphere)
        }

        fn dcd_contacts(
            &self,
            _a: &PosedShape,
            _b: &PosedShape,
            _pool: &mut ShapePool,
        ) -> Vec<Contact> {
            Vec::new()
        }

        fn supports_ccd(&self) -> bool {
            true
        }

        fn ccd_contacts(
            &self,
            _a: &PosedInterval,
            _b: &PosedInterval,
            _pool: &mut ShapePool,
        ) -> Vec<Contact> {
            vec![Contact::continuous(
                0.5,
                0.0,
                DVec3::ZERO,
                DVec3::Y,
                (Location::from_rigid(DVec3::ZERO), Location::from_rigid(DVec3::ZERO)),
            )]
        }
    }

    #[test]
    fn test_loop_stops_at_iteration_limit() {
        let mut world = hecs::World::new();
        let sphere = || {
            (
                Collider::continuous(Shape::Sphere { radius: 1.0 }),
                PoseInterval::default(),
            )
        };
        let a = world.spawn(sphere());
        let b = world.spawn(sphere());
        let mut pairs = vec![CollisionPair::new(a, b, DetectionType::Continuous)];

        let mut registry = ContactCalculatorRegistry::new();
        registry.register(AlwaysHalfway).unwrap();
        let solver = GaussSeidelSolver::default();
        let config = CcdLoopConfig {
            max_iterations: 7,
            ..Default::default()
        };
        let report =
            CcdCollisionLoop::new(config, &registry, &solver, 0.0).run(&mut world, &mut pairs, 1.0);

        assert_eq!(report.iterations, 7);
        assert_eq!(report.termination, CcdTermination::IterationLimit);
        let eps = 1e-12;
        assert!((report.time_of_impact - (1.0 - 0.5f64.powi(7))).abs() < eps);
    }

    #[test]
    fn test_loop_step_consumed() {
        struct AtEnd;
        impl ContactCalculator for AtEnd {
            fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
                (ShapeKind::Sphere, ShapeKind::Sphere)
            }
            fn dcd_contacts(
                &self,
                _a: &PosedShape,
                _b: &PosedShape,
                _pool: &mut ShapePool,
            ) -> Vec<Contact> {
                Vec::new()
            }
            fn supports_ccd(&self) -> bool {
                true
            }
            fn ccd_contacts(
                &self,
                _a: &PosedInterval,
                _b: &PosedInterval,
                _pool: &mut ShapePool,
            ) -> Vec<Contact> {
                vec![Contact::continuous(
                    1.0,
                    0.0,
                    DVec3::ZERO,
                    DVec3::Y,
                    (Location::from_rigid(DVec3::ZERO), Location::from_rigid(DVec3::ZERO)),
                )]
            }
        }

        let mut world = hecs::World::new();
        let a = world.spawn((
            Collider::continuous(Shape::Sphere { radius: 1.0 }),
            PoseInterval::default(),
        ));
        let b = world.spawn((
            Collider::continuous(Shape::Sphere { radius: 1.0 }),
            PoseInterval::default(),
        ));
        let mut pairs = vec![CollisionPair::new(a, b, DetectionType::Continuous)];
        let mut registry = ContactCalculatorRegistry::new();
        registry.register(AtEnd).unwrap();
        let solver = GaussSeidelSolver::default();

        let report = CcdCollisionLoop::new(CcdLoopConfig::default(), &registry, &solver, 0.0)
            .run(&mut world, &mut pairs, 1.0);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.termination, CcdTermination::StepConsumed);
        assert_eq!(report.time_of_impact, 1.0);
    }

    #[test]
    fn test_loop_reports_resolution_failure() {
        let mut world = hecs::World::new();
        // Contacts without any coordinate cannot be localized
        let a = world.spawn((
            Collider::continuous(Shape::Sphere { radius: 1.0 }),
            PoseInterval::default(),
        ));
        let b = world.spawn((
            Collider::continuous(Shape::Sphere { radius: 1.0 }),
            PoseInterval::default(),
        ));
        let mut pairs = vec![CollisionPair::new(a, b, DetectionType::Continuous)];

        struct Unlocalizable;
        impl ContactCalculator for Unlocalizable {
            fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
                (ShapeKind::Sphere, ShapeKind::Sphere)
            }
            fn dcd_contacts(
                &self,
                _a: &PosedShape,
                _b: &PosedShape,
                _pool: &mut ShapePool,
            ) -> Vec<Contact> {
                Vec::new()
            }
            fn supports_ccd(&self) -> bool {
                true
            }
            fn ccd_contacts(
                &self,
                _a: &PosedInterval,
                _b: &PosedInterval,
                _pool: &mut ShapePool,
            ) -> Vec<Contact> {
                vec![timed_contact(0.25)]
            }
        }
        let mut registry = ContactCalculatorRegistry::new();
        registry.register(Unlocalizable).unwrap();
        let solver = GaussSeidelSolver::default();

        let report = CcdCollisionLoop::new(CcdLoopConfig::default(), &registry, &solver, 0.0)
            .run(&mut world, &mut pairs, 1.0);
        assert_eq!(report.termination, CcdTermination::SolverFailure);
        assert_eq!(report.iterations, 1);
        assert!(!pairs[0].has_contacts());
    }
}
