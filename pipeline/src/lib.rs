pub mod admission;
pub mod alerts;
pub mod decision;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod rules;
pub mod worker;
