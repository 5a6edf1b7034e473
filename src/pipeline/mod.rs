//! Pipeline module - encoding, fitting, weighting and estimation

pub mod config;
pub mod demographics;
pub mod encoder;
pub mod error;
pub mod estimator;
pub mod loader;
pub mod missing;
pub mod model;
pub mod tables;
pub mod tally;
pub mod weights;

pub use config::{EstimatorConfig, QuestionSpec, RawBasis, StudyConfig};
pub use demographics::*;
pub use encoder::{
    FeatureEncoder, FeatureMatrix, FittedEncoder, StandardScaler, REGION_FEATURE_PREFIX,
    STANDARDIZED_FEATURES,
};
pub use error::PostStratError;
pub use estimator::*;
pub use loader::*;
pub use missing::*;
pub use model::{softmax, ClassCoefficients, ModelConfig, QuestionModel};
pub use tables::*;
pub use tally::*;
pub use weights::*;
