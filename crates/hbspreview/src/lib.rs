pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

/// Install the stderr log subscriber at the given verbosity.
pub fn init(verbosity: u8) {
    infra::logging::init(verbosity);
}
