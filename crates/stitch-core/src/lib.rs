//! Shared engine types for the stitch Discord/GitHub mirror bridge.
//! This crate provides the mirror registry, identity correlation, the
//! lock/archive transition guard, canonical events, and the platform
//! capability traits consumed by the runtime crates.

pub mod correlation;
pub mod events;
pub mod mirror_store;
pub mod platform;
pub mod render;
pub mod transition_guard;
