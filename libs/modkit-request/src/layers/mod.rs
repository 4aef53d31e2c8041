//! Tower layers applied to every hop.
//!
//! - [`HopSpanLayer`] - one `tracing` span per hop
//! - [`UserAgentLayer`] - client-wide default User-Agent

mod span;
mod user_agent;

pub(crate) use span::HopIndex;
pub use span::{HopSpanLayer, HopSpanService};
pub use user_agent::{UserAgentLayer, UserAgentService};
