//! Application layer: the render pipeline and change-reactivity engine.

pub mod context;
pub mod fragments;
pub mod previewer;
pub mod registry;
pub mod render;
pub mod session;
