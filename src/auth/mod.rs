mod extractors;
mod middleware;

pub use extractors::{Activated, Authenticated, CurrentUser, Permitted};
pub use middleware::authenticate;
