//! Difference bound matrices and federations of them for the symbolic analysis of timed systems.

pub mod api;
pub mod error;
pub mod zones;

pub use error::ZoneError;
pub use zones::{
    bounds::MaxBounds,
    constraint::{
        Clock, Constraint, Limit, Raw, Relation, Strictness, FLOOR, INFINITY, MAX_LIMIT, MIN_LIMIT,
        REFERENCE, ZERO,
    },
    dbm::{Canonical, Dirty, Inclusion, DBM},
    federation::Federation,
};
