/// Middleware module
///
/// Bearer-token authentication for the protected session routes.

mod jwt_middleware;

pub use jwt_middleware::{bearer_token, JwtMiddleware};
