//! Broadphase pair generation using swept AABB overlap tests.

use tracing::{debug, warn};

use crate::collision::contact::{CollisionPair, DetectionType};
use crate::ecs::components::Collider;
use crate::math::Aabb;

use super::representation::{is_movable, swept_aabb};

/// Sweep-and-prune broadphase along the x axis.
pub struct SweepAndPrune;

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self
    }
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self
    }

    /// Collision pairs for every two colliders whose bounds overlap over the step interval.
    ///
    /// Only returns pairs where at least one representation can be moved by contact
    /// corrections. A pair is continuous when either collider asks for continuous detection.
    /// Movable colliders with self collision enabled are also paired with themselves.
    pub fn find_pairs(&self, world: &hecs::World) -> Vec<CollisionPair> {
        struct Entry {
            entity: hecs::Entity,
            aabb: Aabb,
            detection: DetectionType,
            movable: bool,
            self_collision: bool,
        }

        let mut entries: Vec<Entry> = Vec::new();
        for (entity, collider) in world.query::<&Collider>().iter() {
            let aabb = match swept_aabb(world, entity) {
                Ok(aabb) => aabb,
                Err(err) => {
                    warn!(?entity, %err, "collider skipped by broadphase");
                    continue;
                }
            };
            entries.push(Entry {
                entity,
                aabb,
                detection: collider.detection,
                movable: is_movable(world, entity),
                self_collision: collider.self_collision,
            });
        }

        entries.sort_by(|a, b| {
            a.aabb
                .min
                .x
                .total_cmp(&b.aabb.min.x)
                .then(a.entity.to_bits().cmp(&b.entity.to_bits()))
        });

        let mut pairs: Vec<CollisionPair> = entries
            .iter()
            .filter(|entry| entry.self_collision && entry.movable)
            .map(|entry| CollisionPair::new(entry.entity, entry.entity, entry.detection))
            .collect();
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if b.aabb.min.x > a.aabb.max.x {
                    break;
                }
                // Nothing to correct between two immovable representations
                if !a.movable && !b.movable {
                    continue;
                }
                if !a.aabb.overlaps(&b.aabb) {
                    continue;
                }
                let detection = if a.detection == DetectionType::Continuous
                    || b.detection == DetectionType::Continuous
                {
                    DetectionType::Continuous
                } else {
                    DetectionType::Discrete
                };
                pairs.push(CollisionPair::new(a.entity, b.entity, detection));
            }
        }

        debug!(colliders = entries.len(), pairs = pairs.len(), "broadphase");
        pairs
    }
}
