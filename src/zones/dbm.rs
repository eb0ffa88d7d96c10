use std::{
    fmt,
    ops::{Index, IndexMut},
    sync::Arc,
};

use bitset::BitSet;
use log::trace;

use super::constraint::{
    Clock, Constraint, Limit, Raw, Relation, FLOOR, INFINITY, REFERENCE, ZERO,
};

/// Written to the reference diagonal once a negative cycle has been found.
const EMPTY: Relation = Relation::strict(-1);

pub trait DBMState: Sized {}

/// The outcome of comparing two sets of clock valuations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Inclusion {
    Different,
    Superset,
    Subset,
    Equal,
}

impl Inclusion {
    pub const fn from_flags(subset: bool, superset: bool) -> Self {
        match (subset, superset) {
            (true, true) => Inclusion::Equal,
            (true, false) => Inclusion::Subset,
            (false, true) => Inclusion::Superset,
            (false, false) => Inclusion::Different,
        }
    }

    /// True for both `Subset` and `Equal`.
    pub const fn is_subset(&self) -> bool {
        matches!(self, Inclusion::Subset | Inclusion::Equal)
    }

    /// True for both `Superset` and `Equal`.
    pub const fn is_superset(&self) -> bool {
        matches!(self, Inclusion::Superset | Inclusion::Equal)
    }

    pub const fn inverse(&self) -> Self {
        match self {
            Inclusion::Subset => Inclusion::Superset,
            Inclusion::Superset => Inclusion::Subset,
            other => *other,
        }
    }
}

/// A difference bound matrix over `dimensions` clocks where clock 0 is the reference clock.
/// The matrix is shared between clones and only copied once one of them is mutated.
#[derive(Clone, Debug)]
pub struct DBM<State: DBMState> {
    /// The number of clocks inside the DBM.
    clocks: Clock,
    /// The relations between the clocks.
    relations: Arc<Box<[Relation]>>,
    /// The internal state important for the current type of DBM.
    state: State,
}

impl<State: DBMState> DBM<State> {
    /// Returns the number of clocks excluding the reference clock.
    pub const fn clocks(&self) -> Clock {
        self.clocks - 1
    }

    /// Returns the number of clocks including the reference clock.
    pub const fn dimensions(&self) -> Clock {
        self.clocks
    }

    pub const fn constraints(&self) -> usize {
        self.clocks as usize * self.clocks as usize
    }

    /// The row-major `dimensions × dimensions` matrix.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// The matrix in its packed integer encoding.
    pub fn raw(&self) -> Vec<Raw> {
        self.relations.iter().map(Relation::raw).collect()
    }

    /// Returns true if another DBM still reads the same matrix.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.relations) > 1
    }

    /// Uses the row-wise indexing and not the layered approach since we have the clock set in the DBM.
    ///
    /// Eg. 3 clocks (including the reference clock) DBM indexing "(row; column)-index":
    ///
    /// [(0; 0)-0, (0; 1)-1, (0; 2)-2]
    ///
    /// [(1; 0)-3, (1; 1)-4, (1; 2)-5]
    ///
    /// [(2; 0)-6, (2; 1)-7, (2; 2)-8]
    #[inline]
    pub const fn index(&self, i: Clock, j: Clock) -> usize {
        i as usize * self.clocks as usize + j as usize
    }

    #[inline]
    pub const fn coordinates(&self, index: usize) -> (Clock, Clock) {
        let i = (index / self.clocks as usize) as Clock;
        let j = (index % self.clocks as usize) as Clock;
        (i, j)
    }

    #[inline]
    pub fn get(&self, i: Clock, j: Clock) -> Relation {
        debug_assert!(i < self.clocks && j < self.clocks, "clock out of range");
        self.relations[self.index(i, j)]
    }

    #[inline]
    pub(super) fn set(&mut self, i: Clock, j: Clock, relation: Relation) {
        debug_assert!(i < self.clocks && j < self.clocks, "clock out of range");
        let index = self.index(i, j);
        Arc::make_mut(&mut self.relations)[index] = relation
    }

    #[inline]
    pub fn upper(&self, clock: Clock) -> Relation {
        self.get(clock, REFERENCE)
    }

    #[inline]
    pub fn lower(&self, clock: Clock) -> Relation {
        self.get(REFERENCE, clock)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        for c in REFERENCE..self.dimensions() {
            if self[(c, c)] < ZERO {
                return true;
            }
        }
        false
    }

    pub(super) fn mark_empty(&mut self) {
        self.set(REFERENCE, REFERENCE, EMPTY);
    }

    /// Floyd-Warshall restricted to the given pivots. If the matrix was closed before and
    /// only cells between pivots changed, then this closes it again. Returns false and
    /// marks the DBM empty when a negative cycle appears.
    pub(super) fn close_over(&mut self, pivots: impl IntoIterator<Item = Clock>) -> bool {
        let dimensions = self.dimensions() as usize;
        let relations = Arc::make_mut(&mut self.relations);

        for k in pivots {
            let k = k as usize;
            for i in 0..dimensions {
                if i == k {
                    continue;
                }

                let ik = relations[i * dimensions + k];
                if ik.is_infinity() {
                    continue;
                }

                for j in 0..dimensions {
                    let ikj = ik.addition(&relations[k * dimensions + j]);
                    if relations[i * dimensions + j] > ikj {
                        relations[i * dimensions + j] = ikj;
                    }
                }

                if relations[i * dimensions + i] < ZERO {
                    relations[0] = EMPTY;
                    return false;
                }
            }
        }

        true
    }

    pub fn fmt_conjunctions(&self, labels: &[&str]) -> String {
        if self.is_empty() {
            return String::from("false");
        }

        let mut conjunctions: Vec<String> = Vec::new();

        for i in REFERENCE + 1..self.dimensions() {
            // Lower bound: 0 - c R N.
            let lower = self.lower(i);
            if !lower.is_zero() {
                conjunctions.push(format!(
                    "-{} {} {}",
                    labels[(i - 1) as usize],
                    lower.strictness(),
                    lower.limit()
                ));
            }

            // Upper bound: c - 0 R N.
            let upper = self.upper(i);
            if !upper.is_infinity() {
                conjunctions.push(format!(
                    "{} {} {}",
                    labels[(i - 1) as usize],
                    upper.strictness(),
                    upper.limit()
                ));
            }

            for j in REFERENCE + 1..self.dimensions() {
                if i == j {
                    continue;
                }

                let relation = self.get(i, j);
                if relation.is_infinity() {
                    continue;
                }

                // Difference constraints: c0 - c1 R N.
                conjunctions.push(format!(
                    "{} - {} {} {}",
                    labels[(i - 1) as usize],
                    labels[(j - 1) as usize],
                    relation.strictness(),
                    relation.limit()
                ));
            }
        }

        if conjunctions.is_empty() {
            return String::from("true");
        }

        conjunctions.join(" ∧ ")
    }
}

impl<T: DBMState> Index<(Clock, Clock)> for DBM<T> {
    type Output = Relation;

    fn index(&self, index: (Clock, Clock)) -> &Self::Output {
        let (i, j) = index;
        &self.relations[self.index(i, j)]
    }
}

/// The DBM is closed, or it is empty.
#[derive(Clone, Debug)]
pub struct Canonical {}
impl DBMState for Canonical {}

impl DBM<Canonical> {
    /// Returns the single valuation where every clock is zero.
    pub fn zero(dimensions: Clock) -> Self {
        assert!(dimensions > 0, "a DBM requires the reference clock");
        Self {
            clocks: dimensions,
            relations: Arc::new(vec![ZERO; dimensions as usize * dimensions as usize].into_boxed_slice()),
            state: Canonical {},
        }
    }

    /// Returns an unconstrained DBM where clocks are only required to be non-negative.
    pub fn universe(dimensions: Clock) -> Self {
        assert!(dimensions > 0, "a DBM requires the reference clock");
        let mut relations = vec![INFINITY; dimensions as usize * dimensions as usize];

        for i in 0..dimensions as usize {
            relations[i] = ZERO;
            relations[i * dimensions as usize + i] = ZERO;
        }

        Self {
            clocks: dimensions,
            relations: Arc::new(relations.into_boxed_slice()),
            state: Canonical {},
        }
    }

    /// Returns a DBM which contains no valuations.
    pub fn empty(dimensions: Clock) -> Self {
        let mut dbm = Self::zero(dimensions);
        dbm.mark_empty();
        dbm
    }

    /// Closes a matrix given in the packed integer encoding.
    pub fn from_raw(dimensions: Clock, raw: &[Raw]) -> Self {
        let relations = raw.iter().map(|raw| Relation::from_raw(*raw)).collect();
        DBM::<Dirty>::from_relations(dimensions, relations).close()
    }

    pub fn is_valid(&self) -> bool {
        !self.is_empty()
    }

    /// Tightens `i - j` to the relation and closes incrementally in O(n²).
    /// Returns false, leaving the DBM empty, if the relation contradicts the zone.
    pub fn constrain(&mut self, i: Clock, j: Clock, relation: Relation) -> bool {
        debug_assert!(i < self.dimensions() && j < self.dimensions(), "clock out of range");

        if self.is_empty() {
            return false;
        }

        if relation >= self[(i, j)] {
            return true;
        }

        if !relation.is_consistent_with(&self[(j, i)]) {
            self.mark_empty();
            return false;
        }

        self.set(i, j, relation);
        self.close_ij(i, j);
        true
    }

    /// Consuming variant of [`DBM::constrain`] which drops the DBM once it becomes empty.
    pub fn tighten(mut self, i: Clock, j: Clock, relation: Relation) -> Option<Self> {
        if self.constrain(i, j, relation) {
            return Some(self);
        }
        None
    }

    /// Constrains `clock - 0`.
    pub fn constrain_upper(&mut self, clock: Clock, relation: Relation) -> bool {
        self.constrain(clock, REFERENCE, relation)
    }

    /// Constrains `0 - clock`, so `(-5, ≤)` means the clock is at least 5.
    pub fn constrain_lower(&mut self, clock: Clock, relation: Relation) -> bool {
        self.constrain(REFERENCE, clock, relation)
    }

    /// Constrains both clocks to be equal.
    pub fn constrain_equal(&mut self, i: Clock, j: Clock) -> bool {
        self.constrain(i, j, ZERO) && self.constrain(j, i, ZERO)
    }

    /// Constrains the clock to be exactly the limit.
    pub fn constrain_clock(&mut self, clock: Clock, limit: Limit) -> bool {
        self.constrain(clock, REFERENCE, Relation::weak(limit))
            && self.constrain(REFERENCE, clock, Relation::weak(limit.saturating_neg()))
    }

    /// Returns true unless tightening `i - j` to the relation would empty the DBM.
    /// This is not an intersection: a relation which only partially overlaps the zone is satisfied.
    pub fn satisfies(&self, i: Clock, j: Clock, relation: Relation) -> bool {
        if self.is_empty() {
            return false;
        }

        self[(i, j)] <= relation || relation.is_consistent_with(&self[(j, i)])
    }

    /// Returns true if the two clocks can be equal.
    pub fn satisfies_equal(&self, i: Clock, j: Clock) -> bool {
        self.satisfies(i, j, ZERO) && self.satisfies(j, i, ZERO)
    }

    /// Propagates the single changed cell `i - j` through all pairs.
    /// Every path k -> i -> j -> l which got shorter is written back.
    fn close_ij(&mut self, i: Clock, j: Clock) {
        let dimensions = self.dimensions() as usize;
        let (i, j) = (i as usize, j as usize);
        let relations = Arc::make_mut(&mut self.relations);
        let ij = relations[i * dimensions + j];

        for k in 0..dimensions {
            let ki = relations[k * dimensions + i];
            if ki.is_infinity() {
                continue;
            }

            let kij = ki.addition(&ij);
            for l in 0..dimensions {
                let jl = relations[j * dimensions + l];
                if jl.is_infinity() {
                    continue;
                }

                let kijl = kij.addition(&jl);
                if relations[k * dimensions + l] > kijl {
                    relations[k * dimensions + l] = kijl;
                }
            }
        }
    }

    /// The up operation computes the strongest postcondition of a zone with respect to delay.
    /// Afterwards the DBM contains the clock assignments that can be reached from by delay.
    /// up(D) = {u + d | u ∈ D, d ∈ ℝ+}.
    /// This operation preserves the canonical form thereby applying it on a canonical DBM
    /// will result in a new canonical DBM.
    pub fn up(&mut self) {
        if self.is_empty() || self.can_delay_indefinite() {
            return;
        }

        for i in REFERENCE + 1..self.dimensions() {
            self.set(i, REFERENCE, INFINITY);
        }
    }

    /// In contrast to Up, Down computes the weakest precondition of the DBM with respect to delay.
    /// down(D) = {u | u + d ∈ D, d ∈ ℝ+} such that the set of clock assignments that can reach D
    /// by some delay d. The lower bound on every clock is relaxed to (0, ≤) and the matrix is closed again.
    pub fn down(&mut self) {
        if self.is_empty() {
            return;
        }

        let mut lowered = false;
        for i in REFERENCE + 1..self.dimensions() {
            if self.lower(i) != ZERO {
                self.set(REFERENCE, i, ZERO);
                lowered = true;
            }
        }

        if lowered {
            self.close_over(REFERENCE..self.dimensions());
        }
    }

    /// Removes all constraints on a given clock, i.e., the clock may take any positive value.
    /// This is expressed as {u[x=d] | u ∈ D, d ∈ ℝ+}.
    pub fn free(&mut self, clock: Clock) {
        assert!(clock != REFERENCE, "the reference clock cannot be freed");

        if self.is_empty() {
            return;
        }

        for i in REFERENCE..self.dimensions() {
            if i != clock {
                self.set(clock, i, INFINITY);
                self.set(i, clock, self.upper(i));
            }
        }
    }

    /// Assigns `x := y + value`. Every valuation where the assignment would make `x`
    /// negative is dropped, which may leave the DBM empty.
    pub fn update(&mut self, x: Clock, y: Clock, value: Limit) {
        assert!(x != REFERENCE, "the reference clock cannot be updated");

        if self.is_empty() {
            return;
        }

        if x == y {
            self.shift(x, value);
            return;
        }

        self.free(x);
        if self.constrain(x, y, Relation::weak(value)) {
            self.constrain(y, x, Relation::weak(value.saturating_neg()));
        }
    }

    /// Sets the clock to be assigned to its limit. This is expressed as {u[x=m] | u ∈ D}.
    pub fn reset(&mut self, clock: Clock, limit: Limit) {
        self.update(clock, REFERENCE, limit);
    }

    /// Compound addition assignment of the clock "clock := clock + offset".
    /// Bounds pushed past the representable range saturate, after which the
    /// matrix is closed again since the saturated cells lost precision.
    pub fn shift(&mut self, clock: Clock, offset: Limit) {
        assert!(clock != REFERENCE, "the reference clock cannot be shifted");

        if self.is_empty() || offset == 0 {
            return;
        }

        let mut saturated = false;
        for i in REFERENCE..self.dimensions() {
            if i == clock {
                continue;
            }

            for (from, to, by) in [(clock, i, offset), (i, clock, offset.saturating_neg())] {
                let current = self[(from, to)];
                let shifted = current.offset(by);
                saturated |= !current.is_infinity() && (shifted.is_infinity() || shifted == FLOOR);
                self.set(from, to, shifted);
            }
        }

        if saturated {
            trace!("shifting clock {} saturated its bounds", clock);
            if !self.close_over(REFERENCE..self.dimensions()) {
                return;
            }
        }

        if offset < 0 {
            self.constrain(REFERENCE, clock, ZERO);
        }
    }

    /// Returns the set inclusion between self and other.
    pub fn relation(&self, other: &Self) -> Inclusion {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "inconsistent DBM cardinality"
        );

        match (self.is_empty(), other.is_empty()) {
            (true, true) => return Inclusion::Equal,
            (true, false) => return Inclusion::Subset,
            (false, true) => return Inclusion::Superset,
            (false, false) => {}
        }

        let mut subset = true;
        let mut superset = true;

        for (lhs, rhs) in self.relations.iter().zip(other.relations.iter()) {
            subset = subset && (lhs <= rhs);
            superset = superset && (lhs >= rhs);

            if !subset && !superset {
                break;
            }
        }

        Inclusion::from_flags(subset, superset)
    }

    /// Returns true if self is a subset of other.
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.relation(other).is_subset()
    }

    /// Returns true if self is a superset of other.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.relation(other).is_superset()
    }

    /// Returns true if all valuations of self are also in other and vice versa.
    pub fn is_eq(&self, other: &Self) -> bool {
        self.relation(other) == Inclusion::Equal
    }

    pub fn is_different(&self, other: &Self) -> bool {
        self.relation(other) == Inclusion::Different
    }

    /// Returns true if all clocks' upper bound is infinity.
    pub fn can_delay_indefinite(&self) -> bool {
        if self.is_empty() {
            return false;
        }

        (REFERENCE + 1..self.dimensions()).all(|i| self.upper(i).is_infinity())
    }

    /// Returns a vector with the length corresponding to each clock in the DBM.
    /// Each group will be assigned a unique index and every clock within the
    /// same group will always be synchronised meaning that the difference between
    /// two clocks of a group is fixed. The second vector is the heads of the different chains.
    pub fn synchronised_clocks(&self) -> (Vec<Clock>, Vec<Clock>) {
        let dimensions = self.dimensions() as usize;
        let mut bits = BitSet::with_capacity(dimensions);
        let mut chains: Vec<Clock> = (REFERENCE..self.dimensions()).collect();
        let mut heads = Vec::with_capacity(dimensions);

        for i in REFERENCE..self.dimensions() {
            // If the clock has already been assigned to a synchronisation group
            // then we skip it and continue to the next one.
            if bits.test(i as usize) {
                continue;
            }

            let mut k = i;
            heads.push(k);
            bits.set(i as usize, true);

            for j in i + 1..self.dimensions() {
                if bits.test(j as usize) {
                    continue;
                }

                // The difference between the clocks' valuations is fixed.
                if self[(i, j)].addition(&self[(j, i)]) == ZERO {
                    chains[k as usize] = j;
                    bits.set(j as usize, true);
                    k = j;
                }
            }

            chains[k as usize] = i;
        }

        (chains, heads)
    }

    /// Returns a bitset over the matrix cells where a set bit means that the constraint is
    /// required in the minimal representation. Closing the required constraints yields the DBM again.
    pub fn minimal(&self) -> BitSet {
        let mut bits = BitSet::with_capacity(self.constraints());
        if self.is_empty() {
            return bits;
        }

        let (chains, heads) = self.synchronised_clocks();

        // Each synchronised group is kept as a single cycle through its members.
        for (clock, next) in chains.iter().enumerate() {
            let clock = clock as Clock;
            if *next != clock {
                bits.set(self.index(clock, *next), true);
            }
        }

        for i in heads.iter() {
            for j in heads.iter() {
                if i == j {
                    continue;
                }

                let ij = self[(*i, *j)];
                if ij.is_infinity() {
                    continue;
                }

                let redundant = heads.iter().any(|k| {
                    *k != *i && *k != *j && self[(*i, *k)].addition(&self[(*k, *j)]) <= ij
                });

                if !redundant {
                    bits.set(self.index(*i, *j), true);
                }
            }
        }

        bits
    }

    /// The constraints of the minimal representation, excluding the trivial lower bounds.
    pub fn minimal_constraints(&self) -> Vec<Constraint> {
        let minimal = self.minimal();
        (0..self.constraints())
            .filter(|index| minimal.test(*index))
            .map(|index| {
                let (i, j) = self.coordinates(index);
                Constraint::new(i, j, self[(i, j)])
            })
            .filter(|constraint| {
                !(constraint.lhs() == REFERENCE && constraint.relation().is_zero())
            })
            .collect()
    }

    // Returns true if an over-approximated intersection was found.
    pub fn maybe_intersects(&self, other: &Self) -> bool {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "inconsistent DBM cardinality"
        );

        if self.is_empty() || other.is_empty() {
            return false;
        }

        for i in REFERENCE + 1..self.dimensions() {
            for j in 0..i {
                if self[(i, j)].addition(&other[(j, i)]) < ZERO {
                    return false;
                }

                if other[(i, j)].addition(&self[(j, i)]) < ZERO {
                    return false;
                }
            }
        }

        true
    }

    /// Intersects self with other in place. Returns false if the intersection is empty.
    pub fn intersect(&mut self, other: &Self) -> bool {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "inconsistent DBM cardinality"
        );

        if self.is_empty() {
            return false;
        }

        if other.is_empty() {
            self.mark_empty();
            return false;
        }

        let mut touched = BitSet::with_capacity(self.dimensions() as usize);
        let mut any = false;

        for i in REFERENCE..self.dimensions() {
            for j in REFERENCE..self.dimensions() {
                let relation = other[(i, j)];
                if relation >= self[(i, j)] {
                    continue;
                }

                if relation.addition(&self[(j, i)]) < ZERO {
                    self.mark_empty();
                    return false;
                }

                self.set(i, j, relation);
                touched.set(i as usize, true);
                touched.set(j as usize, true);
                any = true;
            }
        }

        if !any {
            return true;
        }

        let pivots: Vec<Clock> = (REFERENCE..self.dimensions())
            .filter(|clock| touched.test(*clock as usize))
            .collect();
        self.close_over(pivots)
    }

    pub fn intersection(mut self, other: &Self) -> Option<Self> {
        if self.intersect(other) {
            return Some(self);
        }
        None
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.maybe_intersects(other) && self.clone().intersect(other)
    }

    /// Widens self to the smallest DBM containing both self and other.
    pub fn convex_union(&mut self, other: &Self) {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "inconsistent DBM cardinality"
        );

        if other.is_empty() {
            return;
        }

        if self.is_empty() {
            *self = other.clone();
            return;
        }

        for i in REFERENCE..self.dimensions() {
            for j in REFERENCE..other.dimensions() {
                if self[(i, j)] < other[(i, j)] {
                    self.set(i, j, other[(i, j)]);
                }
            }
        }
    }

    /// Computes self - other as pairwise disjoint DBMs. Each constraint of other's minimal
    /// representation which cuts into the remainder contributes the piece of the remainder
    /// violating it, and the remainder is then restricted to the constraint.
    pub fn subtraction(&self, other: &Self) -> Vec<DBM<Canonical>> {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "inconsistent DBM cardinality"
        );

        if self.is_empty() {
            return vec![];
        }

        if !self.intersects(other) {
            return vec![self.clone()];
        }

        let mut remainder = self.clone();
        let mut difference = Vec::new();

        let constraints = other.minimal_constraints();
        for constraint in constraints.iter() {
            let (i, j) = (constraint.lhs(), constraint.rhs());

            // The remainder already respects the constraint.
            if constraint.relation() >= remainder[(i, j)] {
                continue;
            }

            let mut piece = remainder.clone();
            let violated = constraint.negation();
            if piece.constrain(violated.lhs(), violated.rhs(), violated.relation()) {
                difference.push(piece);
            }

            if !remainder.constrain(i, j, constraint.relation()) {
                break;
            }
        }

        trace!(
            "subtraction produced {} pieces from {} constraints",
            difference.len(),
            constraints.len()
        );

        difference
    }

    pub fn dirty(self) -> DBM<Dirty> {
        let dimensions = self.dimensions();
        DBM {
            clocks: self.clocks,
            relations: self.relations,
            state: Dirty::new(dimensions),
        }
    }

    pub fn is_closed(&self) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut dirty = self.clone().dirty();
        dirty.state.touch_all();
        dirty.close() == *self
    }
}

impl PartialEq for DBM<Canonical> {
    fn eq(&self, other: &Self) -> bool {
        if self.dimensions() != other.dimensions() {
            return false;
        }

        match (self.is_empty(), other.is_empty()) {
            (true, true) => true,
            (false, false) => self.relations == other.relations,
            _ => false,
        }
    }
}

impl Eq for DBM<Canonical> {}

impl fmt::Display for DBM<Canonical> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "DBM[empty]");
        }

        for i in REFERENCE..self.dimensions() {
            let row: Vec<String> = (REFERENCE..self.dimensions())
                .map(|j| self[(i, j)].to_string())
                .collect();
            writeln!(f, "[{}]", row.join(", "))?;
        }

        Ok(())
    }
}

/// Cells have been written without closing. The flags mark the clocks whose rows or columns changed.
pub struct Dirty {
    clocks: Clock,
    flags: BitSet,
}

impl DBMState for Dirty {}

impl Dirty {
    pub fn new(clocks: Clock) -> Self {
        Self {
            clocks,
            flags: BitSet::with_capacity(clocks as usize),
        }
    }

    pub fn any_touched(&self) -> bool {
        self.flags.any()
    }

    pub fn is_touched(&self, clock: Clock) -> bool {
        self.flags.test(clock as usize)
    }

    fn touch(&mut self, clock: Clock) {
        self.flags.set(clock as usize, true);
    }

    fn touch_all(&mut self) {
        for clock in REFERENCE..self.clocks {
            self.touch(clock);
        }
    }

    fn touched(&self) -> Vec<Clock> {
        (REFERENCE..self.clocks)
            .filter(|clock| self.is_touched(*clock))
            .collect()
    }
}

impl DBM<Dirty> {
    /// Takes an arbitrary row-major matrix. Diagonal cells above (0, ≤) and lower bounds which
    /// would allow negative clocks are tightened since neither changes the set of valuations.
    pub fn from_relations(dimensions: Clock, mut relations: Box<[Relation]>) -> DBM<Dirty> {
        assert!(dimensions > 0, "a DBM requires the reference clock");
        assert_eq!(
            dimensions as usize * dimensions as usize,
            relations.len(),
            "matrix does not match the dimension"
        );

        let d = dimensions as usize;
        for i in 0..d {
            if relations[i * d + i] > ZERO {
                relations[i * d + i] = ZERO;
            }
            if relations[i] > ZERO {
                relations[i] = ZERO;
            }
        }

        let mut state = Dirty::new(dimensions);
        state.touch_all();

        Self {
            clocks: dimensions,
            relations: Arc::new(relations),
            state,
        }
    }

    pub fn tighten(&mut self, i: Clock, j: Clock, relation: Relation) {
        if relation < self[(i, j)] {
            self[(i, j)] = relation
        }
    }

    /// Closes the matrix using the touched clocks as pivots. A negative cycle
    /// leaves the resulting DBM empty.
    pub fn close(mut self) -> DBM<Canonical> {
        if self.is_empty() {
            self.mark_empty();
        } else if self.state.any_touched() {
            let pivots = self.state.touched();
            if !self.close_over(pivots) {
                trace!("closure found a negative cycle");
            }
        }

        DBM {
            clocks: self.clocks,
            relations: self.relations,
            state: Canonical {},
        }
    }
}

impl IndexMut<(Clock, Clock)> for DBM<Dirty> {
    fn index_mut(&mut self, clocks: (Clock, Clock)) -> &mut Self::Output {
        let (i, j) = clocks;
        self.state.touch(i);
        self.state.touch(j);
        let index = self.index(i, j);
        &mut Arc::make_mut(&mut self.relations)[index]
    }
}
