//! Model artifacts: estimators, encoders, and the per-domain registry

pub mod encoder;
pub mod inference;
pub mod loader;
pub mod registry;

pub use encoder::{Encoder, LabelEncoder};
pub use inference::{Estimator, OnnxEstimator};
pub use loader::ModelLoader;
pub use registry::{ModelRegistry, RegistryError};
