//! The validated call surface of the engine. Every function checks its clock indices
//! and dimensions before touching a zone and reports violations as [`ZoneError`].

use crate::{
    error::{Result, ZoneError},
    zones::{
        bounds::MaxBounds,
        constraint::{Clock, Limit, Raw, Relation, Strictness, REFERENCE},
        dbm::{Canonical, Inclusion, DBM},
        federation::Federation,
    },
};

fn check_dimension(dimensions: Clock) -> Result<()> {
    if dimensions == 0 {
        return Err(ZoneError::InvalidDimension);
    }
    Ok(())
}

fn check_clock(dimensions: Clock, clock: Clock) -> Result<()> {
    if clock >= dimensions {
        return Err(ZoneError::ClockOutOfRange {
            clock,
            dimension: dimensions,
        });
    }
    Ok(())
}

fn check_free_clock(dimensions: Clock, clock: Clock) -> Result<()> {
    check_clock(dimensions, clock)?;
    if clock == REFERENCE {
        return Err(ZoneError::ReferenceClock);
    }
    Ok(())
}

fn check_same(expected: Clock, found: Clock) -> Result<()> {
    if expected != found {
        return Err(ZoneError::DimensionMismatch { expected, found });
    }
    Ok(())
}

fn max_bounds(dimensions: Clock, max_per_clock: &[Limit]) -> Result<MaxBounds> {
    if max_per_clock.len() != dimensions as usize {
        return Err(ZoneError::BoundsMismatch {
            expected: dimensions,
            found: max_per_clock.len(),
        });
    }

    let mut bounds = MaxBounds::new(dimensions);
    for clock in REFERENCE + 1..dimensions {
        bounds.add_bound(clock, max_per_clock[clock as usize]);
    }
    Ok(bounds)
}

pub fn encode_bound(bound: Limit, strict: bool) -> Raw {
    Relation::new(bound, Strictness::from_strict(strict)).raw()
}

pub fn decode_bound(raw: Raw) -> (Limit, bool) {
    let relation = Relation::from_raw(raw);
    (relation.limit(), relation.is_strict())
}

pub fn zero(dimensions: Clock) -> Result<DBM<Canonical>> {
    check_dimension(dimensions)?;
    Ok(DBM::zero(dimensions))
}

pub fn unconstrained(dimensions: Clock) -> Result<DBM<Canonical>> {
    check_dimension(dimensions)?;
    Ok(DBM::universe(dimensions))
}

/// Tightens `xi - xj` and returns false once the DBM is empty.
pub fn constrain(
    dbm: &mut DBM<Canonical>,
    i: Clock,
    j: Clock,
    bound: Limit,
    strict: bool,
) -> Result<bool> {
    check_clock(dbm.dimensions(), i)?;
    check_clock(dbm.dimensions(), j)?;
    Ok(dbm.constrain(i, j, Relation::new(bound, Strictness::from_strict(strict))))
}

pub fn up(dbm: &mut DBM<Canonical>) {
    dbm.up();
}

pub fn down(dbm: &mut DBM<Canonical>) {
    dbm.down();
}

/// Assigns `x := y + value`.
pub fn update(dbm: &mut DBM<Canonical>, x: Clock, y: Clock, value: Limit) -> Result<()> {
    check_free_clock(dbm.dimensions(), x)?;
    check_clock(dbm.dimensions(), y)?;
    dbm.update(x, y, value);
    Ok(())
}

pub fn free_clock(dbm: &mut DBM<Canonical>, clock: Clock) -> Result<()> {
    check_free_clock(dbm.dimensions(), clock)?;
    dbm.free(clock);
    Ok(())
}

pub fn is_valid(dbm: &DBM<Canonical>) -> bool {
    dbm.is_valid()
}

pub fn value_at(dbm: &DBM<Canonical>, i: Clock, j: Clock) -> Result<Raw> {
    check_clock(dbm.dimensions(), i)?;
    check_clock(dbm.dimensions(), j)?;
    Ok(dbm.get(i, j).raw())
}

pub fn satisfies(
    dbm: &DBM<Canonical>,
    i: Clock,
    j: Clock,
    bound: Limit,
    strict: bool,
) -> Result<bool> {
    check_clock(dbm.dimensions(), i)?;
    check_clock(dbm.dimensions(), j)?;
    Ok(dbm.satisfies(i, j, Relation::new(bound, Strictness::from_strict(strict))))
}

/// Builds a federation from `dimensions × dimensions` raw matrices. Matrices which close
/// to an empty zone are skipped.
pub fn from_dbms<M: AsRef<[Raw]>>(matrices: &[M], dimensions: Clock) -> Result<Federation> {
    check_dimension(dimensions)?;
    let expected = dimensions as usize * dimensions as usize;
    for matrix in matrices {
        let length = matrix.as_ref().len();
        if length != expected {
            return Err(ZoneError::MalformedMatrix {
                length,
                dimension: dimensions,
            });
        }
    }

    Ok(Federation::from_raw_matrices(dimensions, matrices))
}

pub fn subtract_dbm(lhs: &DBM<Canonical>, rhs: &DBM<Canonical>) -> Result<Federation> {
    check_same(lhs.dimensions(), rhs.dimensions())?;
    Ok(Federation::new(lhs.dimensions(), lhs.subtraction(rhs)))
}

pub fn subtract_dbm_federation(lhs: &DBM<Canonical>, rhs: &Federation) -> Result<Federation> {
    check_same(lhs.dimensions(), rhs.dimensions())?;
    Ok(Federation::from_dbm(lhs.clone()).subtraction(rhs))
}

pub fn subtract(lhs: &Federation, rhs: &Federation) -> Result<Federation> {
    check_same(lhs.dimensions(), rhs.dimensions())?;
    Ok(lhs.clone().subtraction(rhs))
}

pub fn intersect(lhs: &Federation, rhs: &Federation) -> Result<Federation> {
    check_same(lhs.dimensions(), rhs.dimensions())?;
    Ok(lhs.intersection(rhs))
}

/// Appends the members of other without reducing.
pub fn union_add(federation: &mut Federation, other: &Federation) -> Result<()> {
    check_same(federation.dimensions(), other.dimensions())?;
    federation.append(other);
    Ok(())
}

pub fn relation(lhs: &Federation, rhs: &Federation, exact: bool) -> Result<Inclusion> {
    check_same(lhs.dimensions(), rhs.dimensions())?;
    Ok(lhs.relation(rhs, exact))
}

pub fn reduce(federation: &mut Federation, expensive: bool) {
    federation.reduce(expensive);
}

pub fn size(federation: &Federation) -> usize {
    federation.len()
}

pub fn dimension(federation: &Federation) -> Clock {
    federation.dimensions()
}

pub fn is_empty(federation: &Federation) -> bool {
    federation.is_empty()
}

pub fn is_unbounded(federation: &Federation) -> bool {
    federation.is_unbounded()
}

/// The members as row-major matrices in the packed integer encoding.
pub fn members(federation: &Federation) -> impl Iterator<Item = Vec<Raw>> + '_ {
    federation.iter().map(|dbm| dbm.raw())
}

/// `max_per_clock` is indexed by clock, so entry 0 belongs to the reference clock and is ignored.
pub fn extrapolate_max_bounds(federation: &mut Federation, max_per_clock: &[Limit]) -> Result<()> {
    let bounds = max_bounds(federation.dimensions(), max_per_clock)?;
    federation.extrapolate_max_bounds(&bounds);
    Ok(())
}

pub fn extrapolate_diagonal_max_bounds(
    federation: &mut Federation,
    max_per_clock: &[Limit],
) -> Result<()> {
    let bounds = max_bounds(federation.dimensions(), max_per_clock)?;
    federation.extrapolate_diagonal_max_bounds(&bounds);
    Ok(())
}

pub fn extrapolate_dbm_max_bounds(dbm: &mut DBM<Canonical>, max_per_clock: &[Limit]) -> Result<()> {
    let bounds = max_bounds(dbm.dimensions(), max_per_clock)?;
    dbm.extrapolate_max_bounds(&bounds);
    Ok(())
}

pub fn extrapolate_dbm_diagonal_max_bounds(
    dbm: &mut DBM<Canonical>,
    max_per_clock: &[Limit],
) -> Result<()> {
    let bounds = max_bounds(dbm.dimensions(), max_per_clock)?;
    dbm.extrapolate_diagonal_max_bounds(&bounds);
    Ok(())
}
