//! Client-side types for twirp_lite.
//!
//! # Example
//!
//! ```ignore
//! use twirp_lite::client::{ClientConfig, ClientTransport};
//!
//! let config = ClientConfig::new().with_literal_urls(true);
//! let client = ClientTransport::new(
//!     "http://localhost:8080",
//!     descriptor,
//!     reqwest::Client::new(),
//!     config,
//! )?;
//!
//! let hat: Hat = client.call("Make_hat", &Size { inches: 12 }).await?;
//! ```

mod config;
mod sender;
mod transport;

pub use config::ClientConfig;
pub use sender::{HttpSender, SendError};
pub use transport::ClientTransport;
