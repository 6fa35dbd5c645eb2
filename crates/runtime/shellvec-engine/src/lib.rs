//! shellvec-engine
//!
//! Module lifecycle on top of shellvec-core.
//!
//! # Components
//! - `args` - Parameter schema, stored arguments and resolution
//! - `vector` - Payload templates and capability-based selection
//! - `format` - Result rendering
//! - `module` - Module trait, shared base and help surface
//! - `runner` - prepare/probe/verify pipeline with error absorption
//! - `chunked` - Multi-round probing over a working set
//! - `catalog` - Named module registry

pub mod args;
pub mod vector;
pub mod format;
pub mod module;
pub mod runner;
pub mod chunked;
pub mod catalog;

pub use args::{ArgumentStore, ParamForm, Parameter, ParameterSchema, ResolvedArgs, Validator};
pub use vector::{Vector, VectorRegistry};
pub use format::stringify;
pub use module::{Context, Execution, HelpOptions, Module, ModuleBase, VECTOR_PARAM};
pub use runner::ModuleRunner;
pub use chunked::{chunk_bounds, ChunkedProbe, ChunkedProbeExecutor, FeatureCheck, Hit, Source, WorkingSet};
pub use catalog::Catalog;
