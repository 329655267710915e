//! Persona Record Writer — profile rows and their public projection.

#[cfg(test)]
pub mod memory;
pub mod models;
pub mod names;
pub mod store;
pub mod writer;
