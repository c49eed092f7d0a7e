pub mod pattern_analyzer;
pub mod templating;

pub use pattern_analyzer::{
    AnalysisResult, FrequencyEntry, ParameterSamples, PathPattern, ResourceGroup,
    TrafficStatistics, TypeInference, ValueType, analyze, infer_parameter_types, infer_value_type,
};
pub use templating::{PathTemplate, PlaceholderKind, detect_resource_type, template_path};
