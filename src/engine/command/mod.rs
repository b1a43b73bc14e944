mod breakpoint;
mod execution;
mod forward;
mod introspection;

pub use breakpoint::Breakpoints;
pub use execution::Execution;
pub use forward::{is_forwarded, Forward};
pub use introspection::Introspection;
