//! Contact calculators and their registry.
//!
//! A calculator handles one ordered pair of [`ShapeKind`]s. The registry maps kind pairs to
//! calculators and dispatches a pair of posed shapes in either order, flipping the contacts
//! back when the calculator was registered for the reversed order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use glam::DAffine3;
use tracing::warn;

use super::calculators;
use super::contact::{Contact, DetectionType};
use super::pool::ShapePool;
use crate::error::{CollisionError, CollisionResult};
use crate::shapes::{Shape, ShapeKind};

/// A shape placed in the world.
#[derive(Debug, Clone)]
pub struct PosedShape {
    pub shape: Arc<Shape>,
    pub pose: DAffine3,
}

impl PosedShape {
    pub fn new(shape: Arc<Shape>, pose: DAffine3) -> Self {
        Self { shape, pose }
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }
}

/// A shape at the start (t = 0) and end (t = 1) of an interval.
#[derive(Debug, Clone)]
pub struct PosedInterval {
    pub start: PosedShape,
    pub end: PosedShape,
}

impl PosedInterval {
    pub fn new(start: PosedShape, end: PosedShape) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.start.kind()
    }
}

/// Narrow-phase algorithm for one pair of shape kinds.
pub trait ContactCalculator: Send + Sync {
    /// Kinds of the first and second shape this calculator expects.
    fn shape_kinds(&self) -> (ShapeKind, ShapeKind);

    /// Contacts between two shapes at the same instant.
    fn dcd_contacts(&self, a: &PosedShape, b: &PosedShape, pool: &mut ShapePool) -> Vec<Contact>;

    fn supports_ccd(&self) -> bool {
        false
    }

    /// Contacts between two shapes moving across an interval, tagged with their time of impact.
    fn ccd_contacts(
        &self,
        _a: &PosedInterval,
        _b: &PosedInterval,
        _pool: &mut ShapePool,
    ) -> Vec<Contact> {
        Vec::new()
    }

    /// Whether one shape can be tested against itself.
    fn supports_self_contact(&self) -> bool {
        false
    }

    /// Contacts of a shape with itself at one instant. Both penetration points lie on `shape`.
    fn dcd_self_contacts(&self, _shape: &PosedShape, _pool: &mut ShapePool) -> Vec<Contact> {
        Vec::new()
    }

    /// Contacts of a shape with itself across an interval.
    fn ccd_self_contacts(&self, _shape: &PosedInterval, _pool: &mut ShapePool) -> Vec<Contact> {
        Vec::new()
    }
}

/// Fallback for shape pairs without a calculator: no contacts, one warning per kind pair.
#[derive(Debug, Default)]
pub struct DefaultContactCalculator {
    warned: Mutex<HashSet<(ShapeKind, ShapeKind, DetectionType)>>,
}

impl DefaultContactCalculator {
    pub fn contacts(
        &self,
        first: ShapeKind,
        second: ShapeKind,
        detection: DetectionType,
    ) -> Vec<Contact> {
        self.warn_once(first, second, detection, "contact calculation not implemented");
        Vec::new()
    }

    fn warn_once(
        &self,
        first: ShapeKind,
        second: ShapeKind,
        detection: DetectionType,
        message: &str,
    ) {
        let first_time = self
            .warned
            .lock()
            .map(|mut warned| warned.insert((first, second, detection)))
            .unwrap_or(false);
        if first_time {
            warn!(?first, ?second, ?detection, "{message}");
        }
    }
}

/// Calculators keyed by shape kind pair.
pub struct ContactCalculatorRegistry {
    calculators: HashMap<(ShapeKind, ShapeKind), Arc<dyn ContactCalculator>>,
    fallback: DefaultContactCalculator,
}

impl Default for ContactCalculatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContactCalculatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.calculators.keys().collect();
        kinds.sort();
        f.debug_struct("ContactCalculatorRegistry")
            .field("calculators", &kinds)
            .finish()
    }
}

impl ContactCalculatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            calculators: HashMap::new(),
            fallback: DefaultContactCalculator::default(),
        }
    }

    /// A registry holding every built-in calculator.
    pub fn with_defaults() -> CollisionResult<Self> {
        let mut registry = Self::new();
        registry.register(calculators::SphereSphereContact)?;
        registry.register(calculators::SpherePlaneContact)?;
        registry.register(calculators::BoxSphereContact)?;
        registry.register(calculators::BoxCapsuleContact)?;
        registry.register(calculators::CapsuleCapsuleContact)?;
        registry.register(calculators::MeshSphereContact)?;
        registry.register(calculators::MeshPlaneContact)?;
        registry.register(calculators::MeshMeshContact)?;
        registry.register(calculators::SegmentMeshContact::default())?;
        registry.register(calculators::OctreeSphereContact)?;
        registry.register(calculators::OctreeCapsuleContact)?;
        registry.register(calculators::OctreeMeshContact)?;
        Ok(registry)
    }

    /// Add a calculator. Fails if one is already registered for its kinds in either order.
    pub fn register<C: ContactCalculator + 'static>(
        &mut self,
        calculator: C,
    ) -> CollisionResult<()> {
        let (first, second) = calculator.shape_kinds();
        if self.calculators.contains_key(&(first, second))
            || self.calculators.contains_key(&(second, first))
        {
            return Err(CollisionError::DuplicateCalculator { first, second });
        }
        self.calculators.insert((first, second), Arc::new(calculator));
        Ok(())
    }

    /// Number of registered calculators.
    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    /// The calculator for `(first, second)`, and whether it expects the shapes swapped.
    pub fn resolve(
        &self,
        first: ShapeKind,
        second: ShapeKind,
    ) -> Option<(&dyn ContactCalculator, bool)> {
        if let Some(calculator) = self.calculators.get(&(first, second)) {
            return Some((calculator.as_ref(), false));
        }
        self.calculators
            .get(&(second, first))
            .map(|calculator| (calculator.as_ref(), true))
    }

    /// Discrete contacts between `a` and `b`, normals oriented to separate `a` from `b`.
    pub fn dcd_contacts(
        &self,
        a: &PosedShape,
        b: &PosedShape,
        pool: &mut ShapePool,
    ) -> Vec<Contact> {
        match self.resolve(a.kind(), b.kind()) {
            Some((calculator, false)) => calculator.dcd_contacts(a, b, pool),
            Some((calculator, true)) => flip_all(calculator.dcd_contacts(b, a, pool)),
            None => self.fallback.contacts(a.kind(), b.kind(), DetectionType::Discrete),
        }
    }

    /// Continuous contacts between `a` and `b` over their intervals.
    pub fn ccd_contacts(
        &self,
        a: &PosedInterval,
        b: &PosedInterval,
        pool: &mut ShapePool,
    ) -> Vec<Contact> {
        match self.resolve(a.kind(), b.kind()) {
            Some((calculator, swapped)) if calculator.supports_ccd() => {
                if swapped {
                    flip_all(calculator.ccd_contacts(b, a, pool))
                } else {
                    calculator.ccd_contacts(a, b, pool)
                }
            }
            Some(_) => {
                self.fallback.warn_once(
                    a.kind(),
                    b.kind(),
                    DetectionType::Continuous,
                    "continuous detection not supported for this shape pair",
                );
                Vec::new()
            }
            None => self.fallback.contacts(a.kind(), b.kind(), DetectionType::Continuous),
        }
    }

    /// Discrete contacts of `shape` with itself.
    pub fn dcd_self_contacts(&self, shape: &PosedShape, pool: &mut ShapePool) -> Vec<Contact> {
        match self.resolve(shape.kind(), shape.kind()) {
            Some((calculator, _)) if calculator.supports_self_contact() => {
                calculator.dcd_self_contacts(shape, pool)
            }
            _ => self.unsupported_self_contact(shape.kind(), DetectionType::Discrete),
        }
    }

    /// Continuous contacts of `shape` with itself over its interval.
    pub fn ccd_self_contacts(&self, shape: &PosedInterval, pool: &mut ShapePool) -> Vec<Contact> {
        match self.resolve(shape.kind(), shape.kind()) {
            Some((calculator, _)) if calculator.supports_self_contact() => {
                calculator.ccd_self_contacts(shape, pool)
            }
            _ => self.unsupported_self_contact(shape.kind(), DetectionType::Continuous),
        }
    }

    fn unsupported_self_contact(&self, kind: ShapeKind, detection: DetectionType) -> Vec<Contact> {
        self.fallback
            .warn_once(kind, kind, detection, "self contact not supported for this shape");
        Vec::new()
    }
}

fn flip_all(contacts: Vec<Contact>) -> Vec<Contact> {
    contacts.iter().map(Contact::flipped).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn posed(shape: Shape, translation: DVec3) -> PosedShape {
        PosedShape::new(Arc::new(shape), DAffine3::from_translation(translation))
    }

    #[test]
    fn test_defaults_register() {
        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        assert_eq!(registry.len(), 12);
        assert!(registry.resolve(ShapeKind::Mesh, ShapeKind::Mesh).is_some());
        let (_, swapped) = registry.resolve(ShapeKind::Sphere, ShapeKind::Mesh).unwrap();
        assert!(swapped);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let result = registry.register(calculators::MeshSphereContact);
        assert!(matches!(
            result,
            Err(CollisionError::DuplicateCalculator {
                first: ShapeKind::Mesh,
                second: ShapeKind::Sphere
            })
        ));
    }

    #[test]
    fn test_duplicate_reversed_order_fails() {
        struct SphereMesh;
        impl ContactCalculator for SphereMesh {
            fn shape_kinds(&self) -> (ShapeKind, ShapeKind) {
                (ShapeKind::Sphere, ShapeKind::Mesh)
            }
            fn dcd_contacts(
                &self,
                _: &PosedShape,
                _: &PosedShape,
                _: &mut ShapePool,
            ) -> Vec<Contact> {
                Vec::new()
            }
        }
        let mut registry = ContactCalculatorRegistry::new();
        registry.register(calculators::MeshSphereContact).unwrap();
        assert!(registry.register(SphereMesh).is_err());
    }

    #[test]
    fn test_reversed_dispatch_flips_normal() {
        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let mut pool = ShapePool::new();
        let sphere = posed(Shape::Sphere { radius: 1.0 }, DVec3::new(0.0, 0.5, 0.0));
        let plane = posed(Shape::Plane, DVec3::ZERO);

        let forward = registry.dcd_contacts(&sphere, &plane, &mut pool);
        let reversed = registry.dcd_contacts(&plane, &sphere, &mut pool);
        assert_eq!(forward.len(), 1);
        assert_eq!(reversed.len(), 1);
        assert_eq!(forward[0].normal, DVec3::Y);
        assert_eq!(reversed[0].normal, DVec3::NEG_Y);
        assert_eq!(forward[0].depth, reversed[0].depth);
    }

    #[test]
    fn test_unregistered_pair_yields_nothing() {
        let registry = ContactCalculatorRegistry::new();
        let mut pool = ShapePool::new();
        let a = posed(Shape::Plane, DVec3::ZERO);
        let b = posed(Shape::Plane, DVec3::ZERO);
        assert!(registry.dcd_contacts(&a, &b, &mut pool).is_empty());
        // A second call stays silent and still yields nothing
        assert!(registry.dcd_contacts(&a, &b, &mut pool).is_empty());
    }

    #[test]
    fn test_self_contact_dispatch() {
        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let mut pool = ShapePool::new();
        // The last segment doubles back over the first, 0.1 above it
        let strand = crate::shapes::SegmentMeshShape::polyline(
            vec![
                DVec3::new(-1.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 0.1, -1.0),
                DVec3::new(0.0, 0.1, 1.0),
            ],
            0.1,
        );
        let strand = posed(Shape::SegmentMesh(strand), DVec3::ZERO);
        assert_eq!(registry.dcd_self_contacts(&strand, &mut pool).len(), 1);

        let sphere = posed(Shape::Sphere { radius: 1.0 }, DVec3::ZERO);
        assert!(registry.dcd_self_contacts(&sphere, &mut pool).is_empty());
    }

    #[test]
    fn test_ccd_without_support_yields_nothing() {
        let registry = ContactCalculatorRegistry::with_defaults().unwrap();
        let mut pool = ShapePool::new();
        let a = posed(Shape::Sphere { radius: 1.0 }, DVec3::ZERO);
        let b = posed(Shape::Sphere { radius: 1.0 }, DVec3::X);
        let contacts = registry.ccd_contacts(
            &PosedInterval::new(a.clone(), a),
            &PosedInterval::new(b.clone(), b),
            &mut pool,
        );
        assert!(contacts.is_empty());
    }
}
