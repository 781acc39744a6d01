//! Run settings and the k-eff power-iteration driver.

pub mod keff;
pub mod settings;
pub mod source;

pub use keff::{partition, KeffDriver, RunSummary};
pub use settings::{ConcurrencyPolicy, CriticalitySettings, Settings, SettingValue};
pub use source::{PointIsotropicSource, SourceSampler};
