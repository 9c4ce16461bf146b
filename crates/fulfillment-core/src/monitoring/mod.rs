//! Background monitoring tasks.

pub mod advancer;

pub use advancer::StageAdvancer;
