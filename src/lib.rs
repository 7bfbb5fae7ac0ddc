//! Orientation search for packing one item type into shipping containers.
//!
//! The core is [`optimizer::optimize`], which tries every distinct
//! axis-aligned orientation of an item inside a container and picks the one
//! with the best volume utilization, optionally capped by payload capacity.
//! [`fleet`] and [`insert`] build on it; [`api`] serves all of it over HTTP.

pub mod api;
pub mod config;
pub mod fleet;
pub mod geometry;
pub mod insert;
pub mod model;
pub mod optimizer;
pub mod recommend;
pub mod types;
