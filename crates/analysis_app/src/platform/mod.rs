mod app;
mod cli;
mod effects;
mod logging;
mod persistence;
mod render;

pub use app::run_app;
