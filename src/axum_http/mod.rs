pub mod default_routers;
pub mod demo_user;
pub mod error_responses;
pub mod http_serve;
pub mod routers;
