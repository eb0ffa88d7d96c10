use std::fmt;

use itertools::Itertools;
use log::{debug, trace};

use super::{
    constraint::{Clock, Limit, Raw, Relation},
    dbm::{Canonical, Inclusion, DBM},
};

/// A finite union of zones. Every member is canonical and non-empty,
/// so the federation is empty exactly when it has no members.
#[derive(Clone, Debug)]
pub struct Federation {
    /// The number of clocks including the reference clock.
    clocks: Clock,
    dbms: Vec<DBM<Canonical>>,
}

impl Federation {
    /// Creates a federation from the DBMs where the empty ones are skipped.
    #[inline]
    pub fn new(dimensions: Clock, dbms: Vec<DBM<Canonical>>) -> Federation {
        assert!(dimensions > 0, "a federation requires the reference clock");
        for dbm in dbms.iter() {
            assert_eq!(
                dbm.dimensions(),
                dimensions,
                "inconsistent dimension between federation and DBM"
            );
        }

        Federation {
            clocks: dimensions,
            dbms: dbms.into_iter().filter(|dbm| !dbm.is_empty()).collect(),
        }
    }

    #[inline]
    pub fn zero(dimensions: Clock) -> Self {
        Self::new(dimensions, vec![DBM::zero(dimensions)])
    }

    #[inline]
    pub fn universe(dimensions: Clock) -> Federation {
        Federation::new(dimensions, vec![DBM::universe(dimensions)])
    }

    #[inline]
    pub fn empty(dimensions: Clock) -> Federation {
        Federation::new(dimensions, vec![])
    }

    pub fn from_dbm(dbm: DBM<Canonical>) -> Self {
        Self::new(dbm.dimensions(), vec![dbm])
    }

    pub fn from_dbms(dimensions: Clock, dbms: Vec<DBM<Canonical>>) -> Self {
        Self::new(dimensions, dbms)
    }

    /// Closes every matrix in its packed integer encoding and keeps the non-empty ones.
    pub fn from_raw_matrices<I, M>(dimensions: Clock, matrices: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[Raw]>,
    {
        let dbms = matrices
            .into_iter()
            .map(|raw| DBM::from_raw(dimensions, raw.as_ref()))
            .collect();
        Self::new(dimensions, dbms)
    }

    /// Returns the number of clocks excluding the reference clock.
    #[inline]
    pub const fn clocks(&self) -> Clock {
        self.clocks - 1
    }

    #[inline]
    pub const fn dimensions(&self) -> Clock {
        self.clocks
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dbms.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dbms.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&DBM<Canonical>> {
        self.dbms.get(index)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &DBM<Canonical>> {
        self.dbms.iter()
    }

    #[inline]
    pub(super) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DBM<Canonical>> {
        self.dbms.iter_mut()
    }

    fn assert_dimensions(&self, dimensions: Clock) {
        assert_eq!(
            self.dimensions(),
            dimensions,
            "inconsistent dimension between federations"
        );
    }

    /// Appends the DBM without reducing. Empty DBMs are ignored.
    #[inline]
    pub fn add(&mut self, dbm: DBM<Canonical>) {
        self.assert_dimensions(dbm.dimensions());
        if !dbm.is_empty() {
            self.dbms.push(dbm);
        }
    }

    /// Appends every member of other without reducing.
    pub fn append(&mut self, other: &Self) {
        self.assert_dimensions(other.dimensions());
        self.dbms.extend(other.dbms.iter().cloned());
    }

    /// Removes all the DBMs from the self federation which
    /// are a subset of (or equal to) the other dbm.
    /// Returns true if the other dbm was a subset of any remaining DBM in self.
    fn remove_subsets(&mut self, other: &DBM<Canonical>) -> bool {
        let mut included = false;
        let mut i = 0;
        while i < self.len() {
            match self.dbms[i].relation(other) {
                Inclusion::Subset | Inclusion::Equal => {
                    self.dbms.swap_remove(i);
                }
                Inclusion::Superset => {
                    included = true;
                    i += 1
                }
                Inclusion::Different => i += 1,
            }
        }

        included
    }

    /// Adds the members of other which are not already covered by a single member of self.
    /// Members of self covered by a single member of other are replaced.
    pub fn union(&mut self, other: Self) {
        self.assert_dimensions(other.dimensions());

        for dbm in other.dbms {
            // If the dbm was not included in self then we append it.
            if !self.remove_subsets(&dbm) {
                self.dbms.push(dbm);
            }
        }
    }

    pub fn intersect(&mut self, operand: &DBM<Canonical>) {
        self.assert_dimensions(operand.dimensions());
        self.dbms.retain_mut(|dbm| dbm.intersect(operand));
    }

    /// Pairwise intersection of the members of both federations.
    pub fn intersection(&self, other: &Self) -> Self {
        self.assert_dimensions(other.dimensions());
        debug!(
            "intersecting federations of {} and {} DBMs",
            self.len(),
            other.len()
        );

        let dbms = self
            .dbms
            .iter()
            .cartesian_product(other.dbms.iter())
            .filter_map(|(lhs, rhs)| lhs.clone().intersection(rhs))
            .collect();

        Self::new(self.dimensions(), dbms)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.assert_dimensions(other.dimensions());
        self.dbms
            .iter()
            .cartesian_product(other.dbms.iter())
            .any(|(lhs, rhs)| lhs.intersects(rhs))
    }

    /// Subtracts a single DBM from every member.
    pub fn subtract(self, subtrahend: &DBM<Canonical>) -> Self {
        self.assert_dimensions(subtrahend.dimensions());

        if self.is_empty() || subtrahend.is_empty() {
            return self;
        }

        // We assume that the difference after subtraction has doubled.
        let mut difference = Self {
            clocks: self.clocks,
            dbms: Vec::with_capacity(self.dbms.len() * 2),
        };

        for dbm in self.dbms {
            // No subtraction is guaranteed to happen so just push the original dbm.
            if !dbm.maybe_intersects(subtrahend) {
                difference.dbms.push(dbm);
                continue;
            }

            let pieces = dbm.subtraction(subtrahend);
            trace!("DBM was split into {} pieces", pieces.len());
            difference.union(Self {
                clocks: difference.clocks,
                dbms: pieces,
            });
        }

        difference
    }

    /// Subtracts each member of other in turn, stopping as soon as nothing is left.
    pub fn subtraction(mut self, other: &Self) -> Self {
        self.assert_dimensions(other.dimensions());
        debug!(
            "subtracting federation of {} DBMs from federation of {} DBMs",
            other.len(),
            self.len()
        );

        for dbm in other.dbms.iter() {
            if self.is_empty() {
                break;
            }
            self = self.subtract(dbm)
        }

        self
    }

    /// The complement with respect to the unconstrained zone.
    pub fn inverse(&self) -> Self {
        Self::universe(self.dimensions()).subtraction(self)
    }

    /// Returns true if every member of self is a subset of a single member of other.
    fn is_covered_by_members(&self, other: &Self) -> bool {
        self.dbms
            .iter()
            .all(|lhs| other.dbms.iter().any(|rhs| lhs.is_subset_of(rhs)))
    }

    /// Returns true if subtracting other from self leaves nothing.
    fn is_subtraction_empty(&self, other: &Self) -> bool {
        if self.is_empty() {
            return true;
        }

        if other.is_empty() {
            return false;
        }

        if self.is_covered_by_members(other) {
            return true;
        }

        self.clone().subtraction(other).is_empty()
    }

    /// Exact set inclusion self ⊆ other.
    pub fn subset_eq(&self, other: &Self) -> bool {
        self.assert_dimensions(other.dimensions());
        self.is_subtraction_empty(other)
    }

    /// Exact set inclusion self ⊇ other.
    pub fn superset_eq(&self, other: &Self) -> bool {
        self.assert_dimensions(other.dimensions());
        other.is_subtraction_empty(self)
    }

    /// Exact set equality.
    pub fn equals(&self, other: &Self) -> bool {
        self.relation(other, true) == Inclusion::Equal
    }

    /// With `exact` the inclusion is decided by subtraction. Otherwise a member-wise
    /// approximation is used which may answer `Different` for sets which are equal or included.
    pub fn relation(&self, other: &Self, exact: bool) -> Inclusion {
        self.assert_dimensions(other.dimensions());
        debug!(
            "relating federations of {} and {} DBMs (exact: {})",
            self.len(),
            other.len(),
            exact
        );

        if exact {
            return Inclusion::from_flags(
                self.is_subtraction_empty(other),
                other.is_subtraction_empty(self),
            );
        }

        Inclusion::from_flags(
            self.is_covered_by_members(other),
            other.is_covered_by_members(self),
        )
    }

    /// Removes members subsumed by another member. The expensive variant also removes
    /// members covered by the union of the rest and merges pairs whose convex hull is
    /// covered by the pair, until nothing changes. The represented set is unchanged.
    pub fn reduce(&mut self, expensive: bool) {
        let before = self.len();

        self.remove_subsumed();
        if expensive {
            loop {
                let covered = self.remove_covered();
                let merged = self.merge_convex();
                if !covered && !merged {
                    break;
                }
                self.remove_subsumed();
            }
        }

        debug!(
            "reduced federation from {} to {} DBMs (expensive: {})",
            before,
            self.len(),
            expensive
        );
    }

    fn remove_subsumed(&mut self) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i < self.dbms.len() {
            let subsumed = self
                .dbms
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && self.dbms[i].is_subset_of(other));

            if subsumed {
                self.dbms.remove(i);
                changed = true;
            } else {
                i += 1;
            }
        }
        changed
    }

    fn remove_covered(&mut self) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i < self.dbms.len() && self.dbms.len() > 1 {
            let dbm = self.dbms.remove(i);
            let single = Self::from_dbm(dbm.clone());
            let rest = Self {
                clocks: self.clocks,
                dbms: self.dbms.clone(),
            };

            if single.is_subtraction_empty(&rest) {
                trace!("removed DBM covered by the remaining federation");
                changed = true;
            } else {
                self.dbms.insert(i, dbm);
                i += 1;
            }
        }
        changed
    }

    fn merge_convex(&mut self) -> bool {
        for i in 0..self.dbms.len() {
            for j in i + 1..self.dbms.len() {
                let mut hull = self.dbms[i].clone();
                hull.convex_union(&self.dbms[j]);

                let pair = Self {
                    clocks: self.clocks,
                    dbms: vec![self.dbms[i].clone(), self.dbms[j].clone()],
                };

                if Self::from_dbm(hull.clone()).is_subtraction_empty(&pair) {
                    trace!("merged DBMs {} and {} into their convex hull", i, j);
                    self.dbms.remove(j);
                    self.dbms[i] = hull;
                    return true;
                }
            }
        }
        false
    }

    /// Returns true if the federation is non-empty and every member can delay forever.
    pub fn is_unbounded(&self) -> bool {
        !self.is_empty() && self.dbms.iter().all(|dbm| dbm.can_delay_indefinite())
    }

    pub fn up(&mut self) {
        for dbm in self.dbms.iter_mut() {
            dbm.up();
        }
    }

    pub fn down(&mut self) {
        for dbm in self.dbms.iter_mut() {
            dbm.down();
        }
    }

    pub fn free_clock(&mut self, clock: Clock) {
        for dbm in self.dbms.iter_mut() {
            dbm.free(clock);
        }
    }

    /// Assigns `x := y + value` in every member, dropping the members which become empty.
    pub fn update(&mut self, x: Clock, y: Clock, value: Limit) {
        self.dbms.retain_mut(|dbm| {
            dbm.update(x, y, value);
            !dbm.is_empty()
        });
    }

    pub fn reset(&mut self, clock: Clock, limit: Limit) {
        self.dbms.retain_mut(|dbm| {
            dbm.reset(clock, limit);
            !dbm.is_empty()
        });
    }

    /// Constrains every member, dropping the ones which become empty.
    /// Returns false if the federation is empty afterwards.
    pub fn constrain(&mut self, i: Clock, j: Clock, relation: Relation) -> bool {
        self.dbms.retain_mut(|dbm| dbm.constrain(i, j, relation));
        !self.is_empty()
    }

    pub fn constrain_equal(&mut self, i: Clock, j: Clock) -> bool {
        self.dbms.retain_mut(|dbm| dbm.constrain_equal(i, j));
        !self.is_empty()
    }

    pub fn constrain_clock(&mut self, clock: Clock, limit: Limit) -> bool {
        self.dbms.retain_mut(|dbm| dbm.constrain_clock(clock, limit));
        !self.is_empty()
    }

    pub fn fmt_disjunctions(&self, labels: &[&str]) -> String {
        if self.is_empty() {
            return String::from("false");
        }

        self.dbms
            .iter()
            .map(|dbm| format!("({})", dbm.fmt_conjunctions(labels)))
            .join(" ∨ ")
    }
}

impl fmt::Display for Federation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Federation[empty]");
        }

        for (index, dbm) in self.dbms.iter().enumerate() {
            writeln!(f, "DBM {}:", index)?;
            write!(f, "{}", dbm)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::zones::{
        constraint::{Relation, REFERENCE},
        dbm::{Canonical, Inclusion, DBM},
    };

    use super::Federation;

    fn point(x: i32, y: i32) -> DBM<Canonical> {
        let mut dbm = DBM::universe(3);
        assert!(dbm.constrain_clock(1, x));
        assert!(dbm.constrain_clock(2, y));
        dbm
    }

    /// A single clock between the two limits.
    fn interval(lower: i32, upper: i32) -> DBM<Canonical> {
        let mut dbm = DBM::universe(2);
        assert!(dbm.constrain_lower(1, Relation::weak(-lower)));
        assert!(dbm.constrain_upper(1, Relation::weak(upper)));
        dbm
    }

    fn box_dbm(x: i32, y: i32) -> DBM<Canonical> {
        let mut dbm = DBM::universe(3);
        assert!(dbm.constrain_upper(1, Relation::weak(x)));
        assert!(dbm.constrain_upper(2, Relation::weak(y)));
        dbm
    }

    #[test]
    fn new_skips_empty_dbms() {
        let federation = Federation::from_dbms(3, vec![DBM::empty(3), point(1, 1)]);
        assert_eq!(1, federation.len());
        assert!(Federation::empty(3).is_empty());
        assert!(!Federation::zero(3).is_empty());
    }

    #[test]
    #[should_panic]
    fn new_rejects_mismatching_dimensions() {
        Federation::from_dbms(3, vec![DBM::universe(2)]);
    }

    #[test]
    fn from_raw_matrices_closes_and_skips_empty() {
        let valid = DBM::universe(2).raw();
        let empty = vec![
            Relation::weak(0).raw(),
            Relation::weak(-2).raw(),
            Relation::weak(1).raw(),
            Relation::weak(0).raw(),
        ];
        let federation = Federation::from_raw_matrices(2, [valid, empty]);
        assert_eq!(1, federation.len());
        assert_eq!(Some(&DBM::universe(2)), federation.get(0));
    }

    #[test]
    fn add_does_not_reduce() {
        let mut federation = Federation::empty(3);
        federation.add(point(1, 1));
        federation.add(point(1, 1));
        assert_eq!(2, federation.len());

        federation.reduce(false);
        assert_eq!(1, federation.len());
    }

    #[test]
    fn disjoint_points_survive_reduction() {
        let mut federation = Federation::from_dbms(3, vec![point(1, 1), point(2, 2)]);
        assert_eq!(2, federation.len());

        federation.reduce(false);
        assert_eq!(2, federation.len());

        federation.reduce(true);
        assert_eq!(2, federation.len());
    }

    #[test]
    fn subtracting_superset_is_empty() {
        let a = Federation::from_dbm(box_dbm(1, 2));
        let difference = a.subtract(&box_dbm(3, 4));
        assert_eq!(0, difference.len());
        assert!(difference.is_empty());
    }

    #[test]
    fn subtracting_from_empty_is_empty() {
        let difference = Federation::empty(3).subtraction(&Federation::from_dbm(point(1, 1)));
        assert!(difference.is_empty());
    }

    #[test]
    fn subtracting_empty_is_identity() {
        let federation = Federation::from_dbm(point(1, 1));
        let difference = federation.clone().subtraction(&Federation::empty(3));
        assert!(difference.equals(&federation));
    }

    #[test]
    fn subtraction_and_union_restore_universe() {
        let universe = Federation::universe(3);
        let mut difference = universe.clone().subtract(&box_dbm(1, 2));
        assert_eq!(2, difference.len());
        assert!(!difference.intersects(&Federation::from_dbm(box_dbm(1, 2))));

        difference.add(box_dbm(1, 2));
        assert_eq!(Inclusion::Equal, difference.relation(&universe, true));
    }

    #[test]
    fn union_replaces_covered_members() {
        let mut federation = Federation::from_dbms(3, vec![point(1, 1), point(5, 5)]);
        federation.union(Federation::from_dbm(box_dbm(2, 2)));
        assert_eq!(2, federation.len());
        assert!(federation.iter().any(|dbm| *dbm == box_dbm(2, 2)));

        federation.union(Federation::from_dbm(point(2, 2)));
        assert_eq!(2, federation.len());
    }

    #[test]
    fn union_into_empty() {
        let mut federation = Federation::empty(3);
        federation.union(Federation::from_dbm(point(1, 1)));
        assert_eq!(1, federation.len());
    }

    #[test]
    fn intersection_is_pairwise() {
        let lhs = Federation::from_dbms(2, vec![interval(0, 1), interval(4, 8)]);
        let rhs = Federation::from_dbm(interval(0, 5));

        let intersection = lhs.intersection(&rhs);
        assert_eq!(2, intersection.len());
        assert!(intersection.equals(&Federation::from_dbms(
            2,
            vec![interval(0, 1), interval(4, 5)]
        )));

        let disjoint = lhs.intersection(&Federation::from_dbm(interval(2, 3)));
        assert!(disjoint.is_empty());
        assert!(!lhs.intersects(&Federation::from_dbm(interval(2, 3))));
    }

    #[test]
    fn intersect_with_dbm_drops_empty_members() {
        let mut federation = Federation::from_dbms(2, vec![interval(0, 1), interval(4, 8)]);
        federation.intersect(&interval(3, 6));
        assert_eq!(1, federation.len());
        assert_eq!(Some(&interval(4, 6)), federation.get(0));
    }

    #[test]
    fn exact_relation_sees_through_splits() {
        let whole = Federation::from_dbm(interval(0, 5));
        let split = Federation::from_dbms(2, vec![interval(0, 3), interval(3, 5)]);

        assert_eq!(Inclusion::Equal, whole.relation(&split, true));
        assert_eq!(Inclusion::Equal, split.relation(&whole, true));
        assert_eq!(Inclusion::Superset, whole.relation(&split, false));
        assert_eq!(Inclusion::Subset, split.relation(&whole, false));
        assert!(whole.subset_eq(&split));
        assert!(whole.superset_eq(&split));
    }

    #[test]
    fn relation_with_empty() {
        let empty = Federation::empty(2);
        let whole = Federation::from_dbm(interval(0, 5));
        assert_eq!(Inclusion::Equal, empty.relation(&empty, true));
        assert_eq!(Inclusion::Subset, empty.relation(&whole, true));
        assert_eq!(Inclusion::Superset, whole.relation(&empty, false));
        assert_eq!(
            Inclusion::Different,
            Federation::from_dbm(interval(0, 1)).relation(&Federation::from_dbm(interval(2, 3)), true)
        );
    }

    #[test]
    fn expensive_reduce_merges_adjacent_pieces() {
        let mut split = Federation::from_dbms(2, vec![interval(0, 3), interval(3, 5)]);
        split.reduce(false);
        assert_eq!(2, split.len());

        split.reduce(true);
        assert_eq!(1, split.len());
        assert_eq!(Some(&interval(0, 5)), split.get(0));
    }

    #[test]
    fn expensive_reduce_removes_covered_member() {
        let mut federation =
            Federation::from_dbms(2, vec![interval(0, 3), interval(2, 6), interval(5, 9)]);
        let original = federation.clone();
        federation.reduce(true);
        assert!(federation.len() < 3);
        assert!(federation.equals(&original));
    }

    #[test]
    fn unbounded_requires_every_member() {
        assert!(Federation::universe(3).is_unbounded());
        assert!(!Federation::empty(3).is_unbounded());

        let mut federation = Federation::from_dbm(point(1, 1));
        assert!(!federation.is_unbounded());
        federation.up();
        assert!(federation.is_unbounded());

        federation.add(point(2, 2));
        assert!(!federation.is_unbounded());
    }

    #[test]
    fn inverse_of_universe_and_empty() {
        assert!(Federation::universe(3).inverse().is_empty());
        assert!(Federation::empty(3)
            .inverse()
            .equals(&Federation::universe(3)));

        let federation = Federation::from_dbm(box_dbm(1, 2));
        assert!(federation.inverse().inverse().equals(&federation));
        assert!(!federation.inverse().intersects(&federation));
    }

    #[test]
    fn constrain_drops_empty_members() {
        let mut federation = Federation::from_dbms(2, vec![interval(0, 1), interval(4, 8)]);
        assert!(federation.constrain(1, REFERENCE, Relation::weak(2)));
        assert_eq!(1, federation.len());
        assert!(!federation.constrain(REFERENCE, 1, Relation::strict(-1)));
        assert!(federation.is_empty());
    }

    #[test]
    fn lifted_operations() {
        let mut federation = Federation::from_dbms(3, vec![point(1, 1), point(2, 4)]);
        federation.reset(1, 0);
        assert!(federation.iter().all(|dbm| dbm.upper(1) == Relation::weak(0)));

        federation.update(1, 2, 1);
        assert!(federation.equals(&Federation::from_dbms(3, vec![point(2, 1), point(5, 4)])));

        federation.free_clock(2);
        federation.down();
        assert!(federation.iter().all(|dbm| dbm.lower(1) == Relation::weak(0)));

        assert!(federation.constrain_clock(1, 3));
        assert!(federation.constrain_equal(1, 2));
        assert!(federation.iter().all(|dbm| dbm.satisfies_equal(1, 2)));
    }

    #[test]
    fn disjunctions() {
        let federation = Federation::from_dbms(2, vec![interval(0, 1), interval(4, 8)]);
        assert_eq!(
            "(x ≤ 1) ∨ (-x ≤ -4 ∧ x ≤ 8)",
            federation.fmt_disjunctions(&["x"])
        );
        assert_eq!("false", Federation::empty(2).fmt_disjunctions(&["x"]));
    }
}
