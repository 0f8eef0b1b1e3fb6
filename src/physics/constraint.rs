//! Contact constraints generated from detected contacts.

use glam::DVec3;

use crate::collision::contact::{CollisionPair, Contact};
use crate::collision::location::Location;

/// Complementarity type of one constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// Unilateral non-penetration: multiplier and violation both non-negative.
    FrictionlessContact,
    /// Equality: the multiplier is free.
    Bilateral,
}

/// One side of a constraint: a point on a representation and the sign it enters the row with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintSide {
    pub entity: hecs::Entity,
    pub location: Location,
    /// `+1` for the first representation, `-1` for the second.
    pub scale: f64,
}

/// A constraint between two representations along a fixed world direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConstraint {
    pub constraint_type: ConstraintType,
    pub normal: DVec3,
    pub sides: [ConstraintSide; 2],
}

impl ContactConstraint {
    /// Non-penetration row for `contact` between the first and second representation of a pair.
    pub fn from_contact(first: hecs::Entity, second: hecs::Entity, contact: &Contact) -> Self {
        let (on_first, on_second) = contact.penetration_points;
        Self {
            constraint_type: ConstraintType::FrictionlessContact,
            normal: contact.normal,
            sides: [
                ConstraintSide {
                    entity: first,
                    location: on_first,
                    scale: 1.0,
                },
                ConstraintSide {
                    entity: second,
                    location: on_second,
                    scale: -1.0,
                },
            ],
        }
    }
}

/// One constraint per contact, in pair order then contact order.
pub fn generate_constraints<'p>(
    pairs: impl IntoIterator<Item = &'p CollisionPair>,
) -> Vec<ContactConstraint> {
    pairs
        .into_iter()
        .flat_map(|pair| {
            pair.contacts()
                .iter()
                .map(|contact| {
                    ContactConstraint::from_contact(pair.first(), pair.second(), contact)
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::contact::DetectionType;

    #[test]
    fn test_one_constraint_per_contact() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut pair = CollisionPair::new(a, b, DetectionType::Discrete);
        let contact = Contact::discrete(
            0.2,
            DVec3::ZERO,
            DVec3::Y,
            (Location::from_rigid(DVec3::X), Location::from_rigid(DVec3::Z)),
        );
        pair.set_contacts(vec![contact.clone(), contact]);

        let constraints = generate_constraints(&[pair]);
        assert_eq!(constraints.len(), 2);
        let c = &constraints[0];
        assert_eq!(c.constraint_type, ConstraintType::FrictionlessContact);
        assert_eq!(c.sides[0].entity, a);
        assert_eq!(c.sides[0].scale, 1.0);
        assert_eq!(c.sides[1].entity, b);
        assert_eq!(c.sides[1].scale, -1.0);
        assert_eq!(c.sides[1].location.rigid_local_position, Some(DVec3::Z));
    }

    #[test]
    fn test_no_contacts_no_constraints() {
        let mut world = hecs::World::new();
        let pair = CollisionPair::new(world.spawn(()), world.spawn(()), DetectionType::Continuous);
        assert!(generate_constraints(&[pair]).is_empty());
    }
}
