//! Common types and utilities shared across all greenpulse services.

pub mod anomaly;
pub mod emission;
pub mod reading;
pub mod snapshot;
pub mod window;

pub use anomaly::{AnomalyDetector, AnomalyVerdict};
pub use emission::estimate_co2_kg_hr;
pub use reading::StationReading;
pub use snapshot::{CityStats, Snapshot};
pub use window::RollingWindow;
