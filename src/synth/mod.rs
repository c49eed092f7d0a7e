pub mod serializer;
pub mod spec_synthesizer;

pub use serializer::{OutputFormat, load_observations, load_observations_file, to_json, to_yaml};
pub use spec_synthesizer::{SynthesisContext, synthesize};
