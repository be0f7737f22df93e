//! Velocity derivation modules

pub mod stable_surface;
pub mod error_model;
pub mod flow_projection;
pub mod velocity;

// Re-export main types
pub use stable_surface::StableSurface;
pub use error_model::{ErrorModel, LinearErrorTerm, magnitude_error};
pub use flow_projection::RangeProjector;
pub use velocity::{
    VelocityDeriver, VelocityParams, VelocityInputs, VelocityProduct, PairGeometry,
    OffsetCalibration, RadarFields, RadarProduct, Component,
};
