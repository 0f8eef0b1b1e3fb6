//! Discrete and continuous detection passes over collision pairs.
//!
//! Each pair's contact list is written by exactly one worker. With the `parallel` feature the
//! pairs are split across the rayon pool, every worker owning its own [`ShapePool`].

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::collision::calculator::ContactCalculatorRegistry;
use crate::collision::contact::{CollisionPair, Contact, DetectionType};
use crate::collision::pool::ShapePool;
use crate::error::CollisionResult;

use super::representation::{posed_interval, posed_shape};

fn discrete_contacts(
    world: &hecs::World,
    registry: &ContactCalculatorRegistry,
    pair: &CollisionPair,
    t: f64,
    pool: &mut ShapePool,
) -> CollisionResult<Vec<Contact>> {
    let a = posed_shape(world, pair.first(), t)?;
    if pair.is_self_contact() {
        return Ok(registry.dcd_self_contacts(&a, pool));
    }
    let b = posed_shape(world, pair.second(), t)?;
    Ok(registry.dcd_contacts(&a, &b, pool))
}

fn continuous_contacts(
    world: &hecs::World,
    registry: &ContactCalculatorRegistry,
    pair: &CollisionPair,
    pool: &mut ShapePool,
) -> CollisionResult<Vec<Contact>> {
    let a = posed_interval(world, pair.first())?;
    if pair.is_self_contact() {
        return Ok(registry.ccd_self_contacts(&a, pool));
    }
    let b = posed_interval(world, pair.second())?;
    Ok(registry.ccd_contacts(&a, &b, pool))
}

fn update_pair<F>(pair: &mut CollisionPair, pool: &mut ShapePool, detect: &F)
where
    F: Fn(&CollisionPair, &mut ShapePool) -> CollisionResult<Vec<Contact>>,
{
    match detect(pair, pool) {
        Ok(contacts) => pair.set_contacts(contacts),
        Err(err) => {
            warn!(
                first = ?pair.first(),
                second = ?pair.second(),
                %err,
                "pair skipped by detection"
            );
            pair.clear_contacts();
        }
    }
}

fn run_pass<F>(pairs: &mut [CollisionPair], detection: DetectionType, detect: F) -> usize
where
    F: Fn(&CollisionPair, &mut ShapePool) -> CollisionResult<Vec<Contact>> + Sync,
{
    #[cfg(feature = "parallel")]
    pairs
        .par_iter_mut()
        .filter(|pair| pair.detection() == detection)
        .for_each_init(ShapePool::default, |pool, pair| update_pair(pair, pool, &detect));

    #[cfg(not(feature = "parallel"))]
    {
        let mut pool = ShapePool::default();
        for pair in pairs.iter_mut().filter(|pair| pair.detection() == detection) {
            update_pair(pair, &mut pool, &detect);
        }
    }

    let contacts = pairs
        .iter()
        .filter(|pair| pair.detection() == detection)
        .map(|pair| pair.contacts().len())
        .sum();
    debug!(?detection, contacts, "detection pass");
    contacts
}

/// Discrete contacts of every discrete pair at interval time `t`. Returns the contact count.
pub fn detect_discrete(
    world: &hecs::World,
    registry: &ContactCalculatorRegistry,
    pairs: &mut [CollisionPair],
    t: f64,
) -> usize {
    run_pass(pairs, DetectionType::Discrete, |pair, pool| {
        discrete_contacts(world, registry, pair, t, pool)
    })
}

/// Continuous contacts of every continuous pair over the remaining interval. Returns the
/// contact count.
pub fn detect_continuous(
    world: &hecs::World,
    registry: &ContactCalculatorRegistry,
    pairs: &mut [CollisionPair],
) -> usize {
    run_pass(pairs, DetectionType::Continuous, |pair, pool| {
        continuous_contacts(world, registry, pair, pool)
    })
}
