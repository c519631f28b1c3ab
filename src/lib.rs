extern crate nalgebra as na;

pub mod clamp;
pub mod combine;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod horizon;
pub mod mppi;
pub mod noise;
pub mod rollout;

pub use clamp::ClampBounds;
pub use config::MppiConfig;
pub use env::Environment;
pub use error::{MppiError, Result};
pub use horizon::{hold_last, zero_fill, ReinitFn};
pub use mppi::{Mppi, PlanStats};
pub use rollout::ValueFn;
