//! Core types shared between the preview engine and its host.

pub mod errors;
pub mod host;
pub mod model;
