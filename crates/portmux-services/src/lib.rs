//! portmux-services — the endpoint registry and its collaborators.

pub mod endpoint;
pub mod frontend;
pub mod listener;
pub mod registry;

pub use endpoint::{EndpointFactory, EndpointHandle, EndpointId, EndpointSpec, SocketEndpointFactory};
pub use frontend::{new_frontend_table, Frontend, FrontendId, FrontendTable, HttpFrontend};
pub use listener::EndpointListener;
pub use registry::{EndpointRegistry, EndpointSummary, PrefixBinding};
