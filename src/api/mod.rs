//! The API layer, containing web handlers and routing.

pub mod handlers;
pub mod router;

pub use handlers::{ACTOR_HEADER, ApiDoc, ConfirmEscrowRequest};
pub use router::create_router;
