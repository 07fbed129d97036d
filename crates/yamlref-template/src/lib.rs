//! Pure detection layer: text in, located [`Reference`]s out.
//!
//! Every function here is total: malformed input yields fewer (or zero)
//! results, never an error. Handlers in `yamlref-engine` pair these
//! detectors with resolvers.

pub mod argo;
pub mod config_refs;
pub mod expr;
pub mod helm;
pub mod template_ref;
pub mod yaml_scan;

pub use expr::{scan_line_exprs, LineExpr};

#[allow(unused_imports)]
use yamlref_core::Reference;
