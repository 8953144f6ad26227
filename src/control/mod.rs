//! Control algorithms: the per-tick decision and the two sub-machines that
//! feed it.

pub mod decision;
pub mod demand;
pub mod lockout;
