//! # Tether Proxy
//! A relay that accepts many clients and carries them over a single
//! connection to a tether server, which either the proxy dials or which
//! dials the proxy.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod downstream;
mod error;
mod proxy;
mod proxy_config;
mod upstream;

pub use error::ProxyError;
pub use proxy::Proxy;
pub use proxy_config::ProxyConfig;
