mod connection;
mod data_rate;

pub(crate) use connection::{ClientConnection, ReceiveState};
pub(crate) use data_rate::DataRate;
