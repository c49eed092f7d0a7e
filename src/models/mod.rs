pub mod har;
pub mod observation;
pub mod openapi;

pub use har::HarArchive;
pub use observation::Observation;
pub use openapi::*;
