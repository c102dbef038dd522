//! crewboard scheduler library.
//!
//! This crate primarily ships a `scheduler` binary, but the store, the
//! scheduling computations and the placement client are exposed as a library
//! for integration testing and for embedding the placement client in other
//! front ends.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod model;
pub mod placement;
pub mod scheduler;
pub mod state;
