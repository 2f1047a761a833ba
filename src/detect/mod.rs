mod backend;
mod backends;
mod filter;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptStep, ScriptedBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use filter::filter_persons;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection, PERSON_CLASS_ID};
