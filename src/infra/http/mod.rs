//! HTTP surface: public router, middleware and request/response helpers.

pub mod helpers;
mod middleware;
pub mod outbound;
mod public;

pub use middleware::RequestContext;
pub use outbound::{FetchError, OutboundClient};
pub use public::{HttpState, build_router};
