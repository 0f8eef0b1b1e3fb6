//! Contact records and collision pairs.

use glam::DVec3;

use super::location::Location;

/// Whether a pair is tested at one instant or across the step interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DetectionType {
    #[default]
    Discrete,
    Continuous,
}

/// One resolved intersection between two shapes.
///
/// Translating shape A by `normal * depth` separates the shapes at the penetration points.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub detection: DetectionType,
    /// Penetration depth, never negative.
    pub depth: f64,
    /// Fraction of the interval at which the shapes first touch. Continuous contacts only.
    pub time: Option<f64>,
    /// Representative world point.
    pub point: DVec3,
    /// Unit direction separating A from B.
    pub normal: DVec3,
    /// Penetration point on A and on B.
    pub penetration_points: (Location, Location),
}

impl Contact {
    pub fn discrete(
        depth: f64,
        point: DVec3,
        normal: DVec3,
        penetration_points: (Location, Location),
    ) -> Self {
        debug_assert!(depth >= 0.0, "negative contact depth {depth}");
        Self {
            detection: DetectionType::Discrete,
            depth,
            time: None,
            point,
            normal,
            penetration_points,
        }
    }

    pub fn continuous(
        time: f64,
        depth: f64,
        point: DVec3,
        normal: DVec3,
        penetration_points: (Location, Location),
    ) -> Self {
        debug_assert!(depth >= 0.0, "negative contact depth {depth}");
        debug_assert!((0.0..=1.0).contains(&time), "time of impact {time} outside [0, 1]");
        Self {
            detection: DetectionType::Continuous,
            depth,
            time: Some(time),
            point,
            normal,
            penetration_points,
        }
    }

    /// The same contact seen from the other shape.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            penetration_points: (self.penetration_points.1, self.penetration_points.0),
            ..self.clone()
        }
    }
}

/// Two representations tested against each other, with the contacts of the last pass.
#[derive(Debug, Clone)]
pub struct CollisionPair {
    first: hecs::Entity,
    second: hecs::Entity,
    detection: DetectionType,
    contacts: Vec<Contact>,
}

impl CollisionPair {
    pub fn new(first: hecs::Entity, second: hecs::Entity, detection: DetectionType) -> Self {
        Self {
            first,
            second,
            detection,
            contacts: Vec::new(),
        }
    }

    #[inline]
    pub fn first(&self) -> hecs::Entity {
        self.first
    }

    #[inline]
    pub fn second(&self) -> hecs::Entity {
        self.second
    }

    #[inline]
    pub fn detection(&self) -> DetectionType {
        self.detection
    }

    /// Whether the pair tests one representation against itself.
    #[inline]
    pub fn is_self_contact(&self) -> bool {
        self.first == self.second
    }

    #[inline]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    #[inline]
    pub fn has_contacts(&self) -> bool {
        !self.contacts.is_empty()
    }

    /// Replace the contact list with the result of a detection pass.
    pub fn set_contacts(&mut self, contacts: Vec<Contact>) {
        debug_assert!(
            contacts.iter().all(|c| c.detection == self.detection),
            "contacts of the wrong detection type for this pair"
        );
        self.contacts = contacts;
    }

    pub fn retain_contacts<F: FnMut(&Contact) -> bool>(&mut self, f: F) {
        self.contacts.retain(f);
    }

    pub fn clear_contacts(&mut self) {
        self.contacts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contact() -> Contact {
        Contact::discrete(
            0.1,
            DVec3::ZERO,
            DVec3::Y,
            (Location::from_rigid(DVec3::X), Location::from_rigid(DVec3::Z)),
        )
    }

    #[test]
    fn test_flipped_contact() {
        let contact = sample_contact();
        let flipped = contact.flipped();
        assert_eq!(flipped.normal, DVec3::NEG_Y);
        assert_eq!(flipped.depth, contact.depth);
        assert_eq!(flipped.penetration_points.0, contact.penetration_points.1);
        assert_eq!(flipped.penetration_points.1, contact.penetration_points.0);
    }

    #[test]
    fn test_pair_contacts() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut pair = CollisionPair::new(a, b, DetectionType::Discrete);
        assert!(!pair.has_contacts());
        pair.set_contacts(vec![sample_contact(), sample_contact()]);
        assert_eq!(pair.contacts().len(), 2);
        pair.retain_contacts(|c| c.depth > 1.0);
        assert!(!pair.has_contacts());
        assert_eq!((pair.first(), pair.second()), (a, b));
    }

    #[test]
    fn test_continuous_contact_time() {
        let contact = Contact::continuous(0.4, 0.0, DVec3::ZERO, DVec3::X, Default::default());
        assert_eq!(contact.time, Some(0.4));
        assert_eq!(contact.detection, DetectionType::Continuous);
    }
}
