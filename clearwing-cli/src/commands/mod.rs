pub mod classes;
pub mod common;
pub mod config;
pub mod transpile;
