//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing with the given output format.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(format: LogFormat) {
    crate::tracing::init(format);
}
