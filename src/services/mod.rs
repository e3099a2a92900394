pub mod aggregate;
pub mod analysis;
pub mod correlation;
pub mod github;
pub mod metrics;
pub mod open_meteo;
pub mod sync;
