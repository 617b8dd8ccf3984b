pub mod compare;
pub mod config;
pub mod domain;
pub mod probes;
pub mod solver;
pub mod workspace;
