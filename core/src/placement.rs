//! Rejection sampling of mutually separated positions on the field

use glam::{DVec2, DVec3};
use rand::Rng;
use rand_pcg::Pcg64;
use thiserror::Error;

/// Attempt budget per requested point before the sampler gives up.
pub const MAX_ATTEMPTS_PER_POINT: usize = 1000;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error(
        "placed {accepted} of {requested} points after {attempts} attempts \
         ({length:.2} x {width:.2} m domain, {separation:.2} m separation)"
    )]
    Capacity {
        requested: usize,
        accepted: usize,
        attempts: usize,
        length: f64,
        width: f64,
        separation: f64,
    },
}

/// Sample `count` positions uniformly over a centred `length` x `width`
/// rectangle so that every pair is at least `separation` apart, all at the
/// given height.
///
/// Candidates violating the separation are rejected and redrawn; the loop is
/// bounded, and a domain too small for the requested count fails with
/// [`PlacementError::Capacity`] instead of spinning.
pub fn generate_moves(
    domain: DVec2,
    count: usize,
    z: f64,
    separation: f64,
    rng: &mut Pcg64,
) -> Result<Vec<DVec3>, PlacementError> {
    let mut points: Vec<DVec3> = Vec::with_capacity(count);
    let half = domain * 0.5;
    let sep_sq = separation * separation;
    let budget = count.saturating_mul(MAX_ATTEMPTS_PER_POINT);
    let mut attempts = 0;
    while points.len() < count {
        if attempts >= budget {
            return Err(PlacementError::Capacity {
                requested: count,
                accepted: points.len(),
                attempts,
                length: domain.x,
                width: domain.y,
                separation,
            });
        }
        attempts += 1;
        let candidate = DVec3::new(
            rng.random_range(-half.x..=half.x),
            rng.random_range(-half.y..=half.y),
            z,
        );
        let clear = points
            .iter()
            .all(|p| (*p - candidate).truncate().length_squared() >= sep_sq);
        if clear {
            points.push(candidate);
        }
    }
    Ok(points)
}
