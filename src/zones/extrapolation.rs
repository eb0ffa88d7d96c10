use log::debug;

use super::{
    bounds::MaxBounds,
    constraint::{Clock, Relation, INFINITY, REFERENCE},
    dbm::{Canonical, DBM},
    federation::Federation,
};

impl DBM<Canonical> {
    /// Classical max-bound extrapolation (Extra_M). Upper bounds above the clock's max bound
    /// are removed and lower bounds below its negated max bound are relaxed to `(-max, <)`.
    /// The result is closed again and always contains the original zone.
    pub fn extrapolate_max_bounds(&mut self, bounds: &MaxBounds) {
        assert_eq!(
            self.dimensions(),
            bounds.dimensions(),
            "inconsistent dimension between DBM and max bounds"
        );

        if self.is_empty() {
            return;
        }

        let mut changed = false;
        for i in REFERENCE..self.dimensions() {
            let upper = Relation::weak(bounds[i]);
            for j in REFERENCE..self.dimensions() {
                if i == j {
                    continue;
                }

                let relation = self[(i, j)];
                if relation.is_infinity() {
                    continue;
                }

                let lower = Relation::strict(-bounds[j]);
                if relation > upper {
                    self.set(i, j, INFINITY);
                    changed = true;
                } else if relation < lower {
                    self.set(i, j, lower);
                    changed = true;
                }
            }
        }

        if changed {
            self.close_over(REFERENCE..self.dimensions());
        }
    }

    /// Diagonal max-bound extrapolation (Extra+_M). Besides the per-clock rule a difference
    /// `i - j` is removed as soon as either clock is known to be beyond its max bound.
    pub fn extrapolate_diagonal_max_bounds(&mut self, bounds: &MaxBounds) {
        assert_eq!(
            self.dimensions(),
            bounds.dimensions(),
            "inconsistent dimension between DBM and max bounds"
        );

        if self.is_empty() {
            return;
        }

        // Every rule reads the lower bounds as they were before extrapolating.
        let lowers: Vec<Relation> = (REFERENCE..self.dimensions())
            .map(|clock| self.lower(clock))
            .collect();
        let beyond = |clock: Clock| lowers[clock as usize] < Relation::strict(-bounds[clock]);

        let mut changed = false;
        for i in REFERENCE..self.dimensions() {
            for j in REFERENCE..self.dimensions() {
                if i == j {
                    continue;
                }

                let relation = self[(i, j)];
                if relation.is_infinity() {
                    continue;
                }

                let widened = if relation > Relation::weak(bounds[i]) || beyond(i) {
                    INFINITY
                } else if beyond(j) && i != REFERENCE {
                    INFINITY
                } else if beyond(j) {
                    Relation::strict(-bounds[j])
                } else {
                    continue;
                };

                self.set(i, j, widened);
                changed = true;
            }
        }

        if changed {
            self.close_over(REFERENCE..self.dimensions());
        }
    }
}

impl Federation {
    pub fn extrapolate_max_bounds(&mut self, bounds: &MaxBounds) {
        debug!(
            "extrapolating {} DBMs with max bounds {:?}",
            self.len(),
            bounds.limits()
        );
        for dbm in self.iter_mut() {
            dbm.extrapolate_max_bounds(bounds);
        }
    }

    pub fn extrapolate_diagonal_max_bounds(&mut self, bounds: &MaxBounds) {
        debug!(
            "extrapolating {} DBMs diagonally with max bounds {:?}",
            self.len(),
            bounds.limits()
        );
        for dbm in self.iter_mut() {
            dbm.extrapolate_diagonal_max_bounds(bounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::zones::{
        bounds::MaxBounds,
        constraint::{Relation, INFINITY},
        dbm::{Canonical, DBM},
        federation::Federation,
    };

    fn point(x: i32, y: i32) -> DBM<Canonical> {
        let mut dbm = DBM::universe(3);
        assert!(dbm.constrain_clock(1, x));
        assert!(dbm.constrain_clock(2, y));
        dbm
    }

    #[test]
    fn large_bounds_change_nothing() {
        let bounds = MaxBounds::from_limits(&[100, 100]).unwrap();
        let mut dbm = point(10, 2);
        dbm.extrapolate_max_bounds(&bounds);
        assert_eq!(point(10, 2), dbm);

        dbm.extrapolate_diagonal_max_bounds(&bounds);
        assert_eq!(point(10, 2), dbm);
    }

    #[test]
    fn clock_above_bound_loses_upper_bound() {
        let bounds = MaxBounds::from_limits(&[5, 5]).unwrap();
        let mut dbm = point(10, 2);
        dbm.extrapolate_max_bounds(&bounds);

        assert!(dbm.is_closed());
        assert_eq!(INFINITY, dbm.upper(1));
        assert!(dbm.lower(1) < Relation::strict(-5));
        assert_eq!(Relation::weak(2), dbm.upper(2));
        assert_eq!(Relation::weak(-2), dbm.lower(2));
        assert!(point(10, 2).is_subset_of(&dbm));
        assert!(point(50, 2).is_subset_of(&dbm));
        assert!(!point(4, 2).is_subset_of(&dbm));
    }

    #[test]
    fn diagonal_extrapolation_is_coarser() {
        let bounds = MaxBounds::from_limits(&[5, 5]).unwrap();
        let mut classical = point(10, 2);
        classical.extrapolate_max_bounds(&bounds);

        let mut diagonal = point(10, 2);
        diagonal.extrapolate_diagonal_max_bounds(&bounds);

        assert!(diagonal.is_closed());
        assert!(classical.is_subset_of(&diagonal));
        assert_eq!(INFINITY, diagonal.get(1, 2));
        assert_eq!(Relation::strict(-5), diagonal.lower(1));
        assert!(point(6, 2).is_subset_of(&diagonal));
    }

    #[test]
    fn empty_stays_empty() {
        let bounds = MaxBounds::from_limits(&[1, 1]).unwrap();
        let mut dbm = DBM::empty(3);
        dbm.extrapolate_max_bounds(&bounds);
        assert!(dbm.is_empty());
        dbm.extrapolate_diagonal_max_bounds(&bounds);
        assert!(dbm.is_empty());
    }

    #[test]
    fn federation_extrapolation_contains_original() {
        let bounds = MaxBounds::from_limits(&[3, 3]).unwrap();
        let original = Federation::from_dbms(3, vec![point(1, 7), point(9, 2)]);

        let mut classical = original.clone();
        classical.extrapolate_max_bounds(&bounds);
        assert_eq!(2, classical.len());
        assert!(original.subset_eq(&classical));

        let mut diagonal = original.clone();
        diagonal.extrapolate_diagonal_max_bounds(&bounds);
        assert!(classical.subset_eq(&diagonal));
    }

    #[test]
    #[should_panic]
    fn mismatching_bounds_panic() {
        let mut dbm = point(1, 1);
        dbm.extrapolate_max_bounds(&MaxBounds::new(2));
    }
}
