//! Internal implementation details.

pub(crate) mod chain;
pub(crate) mod cycles;

pub(crate) use chain::CycleChain;
