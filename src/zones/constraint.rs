use std::{
    fmt,
    ops::{Add, Neg},
};

use rand::{
    distributions::{Standard, Uniform},
    prelude::Distribution,
    Rng,
};

/// The unique index of a clock. This can be used to directly address the DBM.
pub type Clock = u16;

/// The zero'th (0) clock is the reference clock and marker of inconsistency.
pub const REFERENCE: Clock = 0;

/// The packed integer representation of a relation.
pub type Raw = i32;

/// Describes the strictness (<, <=) of the constraint between two clocks in the DBM.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum Strictness {
    Strict,
    Weak,
}

impl Strictness {
    pub const fn opposite(&self) -> Self {
        match self {
            Strictness::Strict => Strictness::Weak,
            Strictness::Weak => Strictness::Strict,
        }
    }

    pub const fn from_strict(strict: bool) -> Self {
        if strict {
            return Strictness::Strict;
        }
        Strictness::Weak
    }
}

impl Distribution<Strictness> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Strictness {
        if rng.gen_bool(1.0 / 2.0) {
            return Strictness::Strict;
        }
        Strictness::Weak
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strictness::Strict => write!(f, "<"),
            Strictness::Weak => write!(f, "≤"),
        }
    }
}

pub type Limit = i32;

/// An element optimized for caching which represents a strict or weak
/// relation between two clocks (c0 - c1 RELATION). This encoding uses
/// the least significant bit to represent the strictness and the other
/// bits as the limit. The encoding is [limit] [1 bit strictness] where
/// a set bit means weak, so `raw = 2 * limit + (weak ? 1 : 0)`.
///
/// The ordering on the raw value is the ordering on tightness: a strict
/// relation is tighter than the weak relation with the same limit.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
#[repr(transparent)]
pub struct Relation(Raw);

/// The maximum possible finite limit. Everything above is represented by [`INFINITY`].
pub const MAX_LIMIT: Limit = Raw::MAX >> 1;
/// The minimum possible limit the relation supports.
pub const MIN_LIMIT: Limit = -MAX_LIMIT;

/// Infinity is the strict relation on the largest limit (∞, <). It marks the
/// absence of a constraint and absorbs every addition.
pub const INFINITY: Relation = Relation(MAX_LIMIT << 1);
/// The tightest representable relation (MIN_LIMIT, <). Everything below saturates to it.
pub const FLOOR: Relation = Relation(MIN_LIMIT << 1);
/// Zero is just a relation with limit of 0 but it is weak and thereby includes 0 (0, ≤).
pub const ZERO: Relation = Relation::new(0, Strictness::Weak);

impl Relation {
    /// Encodes the limit and strictness. Limits at or above [`MAX_LIMIT`] become
    /// [`INFINITY`] and limits below [`MIN_LIMIT`] become [`FLOOR`].
    pub const fn new(limit: Limit, strictness: Strictness) -> Self {
        if limit >= MAX_LIMIT {
            return INFINITY;
        }
        if limit < MIN_LIMIT {
            return FLOOR;
        }

        let strictness_bit = match strictness {
            Strictness::Strict => 0,
            Strictness::Weak => 1,
        };
        Self((limit << 1) | strictness_bit)
    }

    pub const fn weak(limit: Limit) -> Self {
        Self::new(limit, Strictness::Weak)
    }

    pub const fn strict(limit: Limit) -> Self {
        Self::new(limit, Strictness::Strict)
    }

    /// Reinterprets an already encoded value. Anything at or above the
    /// infinity encoding is treated as infinity and anything below the floor as the floor.
    pub const fn from_raw(raw: Raw) -> Self {
        Self::saturate(raw as i64)
    }

    /// Clamps a raw value computed in a wider type into the representable range.
    const fn saturate(raw: i64) -> Self {
        if raw >= INFINITY.0 as i64 {
            return INFINITY;
        }
        if raw < FLOOR.0 as i64 {
            return FLOOR;
        }
        Self(raw as Raw)
    }

    pub const fn raw(&self) -> Raw {
        self.0
    }

    /// Returns the limit of the relation which can be
    /// represented with one less bit than the relation
    /// as the last bit describes the relation's strictness.
    pub const fn limit(&self) -> Limit {
        self.0 >> 1
    }

    /// Returns the strictness of the relation.
    pub const fn strictness(&self) -> Strictness {
        if self.is_strict() {
            return Strictness::Strict;
        }
        Strictness::Weak
    }

    /// Returns true if the strictness of the relation is strict.
    pub const fn is_strict(&self) -> bool {
        (self.0 & 1) == 0
    }

    /// Returns true if the strictness of the relation is weak.
    pub const fn is_weak(&self) -> bool {
        !self.is_strict()
    }

    /// Returns true if the relation represents a infinite relation (∞, <).
    pub const fn is_infinity(&self) -> bool {
        self.0 >= INFINITY.0
    }

    /// Returns true if the relation represents a zero relation (0, ≤).
    pub const fn is_zero(&self) -> bool {
        self.0 == ZERO.0
    }

    /// The opposite-direction relation: (n, ≤) becomes (-n, <) and (n, <) becomes (-n, ≤).
    /// A relation `r` on `i - j` and its negation on `j - i` can never both hold, so
    /// tightening `r` into a cell whose mirror is at most `r.negation()` closes a negative cycle.
    /// The negation of the floor is not representable and saturates to infinity.
    pub const fn negation(&self) -> Self {
        Self::saturate(1 - self.0 as i64)
    }

    /// Returns the sum of two constraints. The sum is satisfies both original constraints (lhs/rhs).
    /// The sum is strict if either operand is strict, since the strict one can never
    /// reach its limit. Infinity absorbs everything and finite sums saturate at infinity
    /// instead of overflowing.
    /// This addition is mostly used to compute the accumulated path when closing a DBM.
    pub const fn addition(&self, other: &Self) -> Self {
        if self.is_infinity() || other.is_infinity() {
            return INFINITY;
        }

        // First adding the lhs and rhs increases the limit.
        // Then we ensure the tightest constraint that satisfies both constraints is kept.
        let sum = (self.0 as i64 + other.0 as i64) - ((self.0 | other.0) & 1) as i64;
        Self::saturate(sum)
    }

    /// Adds an offset to the limit and keeps the strictness, i.e. `self + (offset, ≤)`.
    /// The offset is not encoded first, so offsets beyond the limit range still saturate.
    pub const fn offset(&self, offset: Limit) -> Self {
        if self.is_infinity() {
            return INFINITY;
        }
        Self::saturate(self.0 as i64 + 2 * offset as i64)
    }

    /// Returns true if the relation on `i - j` can hold together with the
    /// `mirror` relation on `j - i`, i.e. their cycle is not negative.
    pub const fn is_consistent_with(&self, mirror: &Relation) -> bool {
        self.addition(mirror).0 >= ZERO.0
    }
}

impl Distribution<Relation> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Relation {
        let strictness: Strictness = rng.gen();
        let limit: Limit = rng.sample(Uniform::new_inclusive(-1_000, 1_000));
        Relation::new(limit, strictness)
    }
}

impl Add for Relation {
    type Output = Relation;

    fn add(self, rhs: Self) -> Self::Output {
        self.addition(&rhs)
    }
}

impl Neg for Relation {
    type Output = Relation;

    fn neg(self) -> Self::Output {
        self.negation()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinity() {
            return write!(f, "(∞, {})", self.strictness());
        }
        write!(f, "({}, {})", self.limit(), self.strictness())
    }
}

/// A single difference constraint `lhs - rhs relation`.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub struct Constraint {
    lhs: Clock,
    rhs: Clock,
    relation: Relation,
}

impl Constraint {
    pub const fn new(lhs: Clock, rhs: Clock, relation: Relation) -> Self {
        Self { lhs, rhs, relation }
    }

    pub const fn upper(clock: Clock, relation: Relation) -> Self {
        Self::new(clock, REFERENCE, relation)
    }

    pub const fn lower(clock: Clock, relation: Relation) -> Self {
        Self::new(REFERENCE, clock, relation)
    }

    pub const fn lhs(&self) -> Clock {
        self.lhs
    }

    pub const fn rhs(&self) -> Clock {
        self.rhs
    }

    pub const fn relation(&self) -> Relation {
        self.relation
    }

    /// The constraint describing the complement: `rhs - lhs relation.negation()`.
    pub const fn negation(&self) -> Self {
        Self::new(self.rhs, self.lhs, self.relation.negation())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} {}", self.lhs, self.rhs, self.relation)
    }
}
