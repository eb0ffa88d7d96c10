pub mod bounds;
pub mod constraint;
pub mod dbm;
pub mod extrapolation;
pub mod federation;
