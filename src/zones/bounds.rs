use std::ops::Index;

use crate::error::{Result, ZoneError};

use super::constraint::{Clock, Limit, REFERENCE};

/// The largest constant each clock is compared against. Extrapolation uses
/// these to abstract away bounds no guard or invariant can distinguish.
/// The entry of the reference clock is always 0.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaxBounds {
    limits: Box<[Limit]>,
}

impl MaxBounds {
    /// Every clock (and the reference clock) starts out with a max bound of 0.
    pub fn new(dimensions: Clock) -> Self {
        Self {
            limits: vec![0; dimensions as usize].into_boxed_slice(),
        }
    }

    /// The max bound of clock `i` is `limits[i - 1]` and the reference clock gets 0.
    /// Fails if there are more limits than addressable clocks.
    pub fn from_limits(limits: &[Limit]) -> Result<Self> {
        let dimensions =
            Clock::try_from(limits.len() + 1).map_err(|_| ZoneError::BoundsMismatch {
                expected: Clock::MAX,
                found: limits.len(),
            })?;

        let mut bounds = Self::new(dimensions);
        for (clock, limit) in (REFERENCE + 1..dimensions).zip(limits) {
            bounds.add_bound(clock, *limit);
        }
        Ok(bounds)
    }

    pub fn dimensions(&self) -> Clock {
        self.limits.len() as Clock
    }

    pub fn get(&self, clock: Clock) -> Limit {
        self.limits[clock as usize]
    }

    pub fn limits(&self) -> &[Limit] {
        &self.limits
    }

    /// Raises the max bound of the clock to the limit if it is larger.
    pub fn add_bound(&mut self, clock: Clock, limit: Limit) {
        assert!(clock != REFERENCE, "the reference clock has no max bound");

        let current = &mut self.limits[clock as usize];
        if *current < limit {
            *current = limit;
        }
    }

    /// Raises every bound to the corresponding bound in other.
    pub fn add_bounds(&mut self, other: &MaxBounds) {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "inconsistent dimension between max bounds"
        );

        for clock in REFERENCE + 1..other.dimensions() {
            self.add_bound(clock, other.get(clock));
        }
    }
}

impl Index<Clock> for MaxBounds {
    type Output = Limit;

    fn index(&self, clock: Clock) -> &Self::Output {
        &self.limits[clock as usize]
    }
}
