// Recognition orchestration: adapters, engine selection, fallback and pass merging
pub mod adapter;
pub mod combiner;
pub mod executor;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod selector;

pub use adapter::{EngineConfig, RecognizerAdapter};
pub use combiner::combine_passes;
pub use executor::{execute_with_fallback, CandidateOrder, Execution};
pub use outcome::{IngestOutcome, Metadata, RecognitionOutcome};
pub use pipeline::{DocumentOptions, EngineSelection, HandwritingOptions, ImageOptions, IngestPipeline};
pub use registry::{AdapterFactory, AdapterRegistry};
pub use runner::{run_engine, Budget, EngineInput};
pub use selector::{auto_select_engine, PilotSettings};
