//! Structured progress events for publish operations.
//!
//! Every stage of a publish emits a start event and either a success or a
//! failure event; the publish as a whole emits its own start/terminal pair
//! so subscribers can tell a single failed stage apart from a failed
//! publish. Emission is a fire-and-forget broadcast: subscribers that lag
//! or disappear never block the publishing path.

pub mod codes;
mod emitter;
mod event;

pub use codes::ErrorCode;
pub use emitter::Emitter;
pub use event::{Event, Operation, Phase};

/// Errors that surface through the event stream carry a machine-readable
/// code plus structured context so UIs can render actionable diagnostics
/// instead of bare messages.
pub trait Coded {
    /// Stable wire code, e.g. `"pythonNotAvailable"`.
    fn code(&self) -> ErrorCode;

    /// Structured context: field names, offending values, allowed bounds.
    fn details(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
