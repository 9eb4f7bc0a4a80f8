//! Optional export of sampled chains.

#[cfg(feature = "csv")]
pub mod csv;
