//! Core data types shared by every component (spec.md §3).

pub mod container;
pub mod counters;
pub mod credentials;
pub mod detector_result;
pub mod labels;
pub mod reference;
pub mod strategy;
pub mod version;

pub use container::MonitoredContainer;
pub use counters::CycleCounters;
pub use credentials::RegistryCredentials;
pub use detector_result::DetectorResult;
pub use reference::split_reference;
pub use strategy::UpdateStrategy;
pub use version::Version;
