#[cfg(feature = "browser")]
pub mod browser;
pub mod config;
pub mod extract;
pub mod gateway;
pub mod script;
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod wait;

#[cfg(feature = "browser")]
pub use browser::BrowserSession;
pub use config::{BrowserSettings, Credentials, GatewayConfig};
pub use extract::DomExtractor;
pub use gateway::HttpGateway;
