//! In-memory transport and fixtures for testing tether servers and clients
//! together in one process.

mod local_network;
pub mod test_services;

pub use helpers::{eventually, init_logging, within, TestClient, TestServer, SETTLE};
pub use local_network::{
    LocalClientReceiver, LocalClientSender, LocalNetwork, LocalServerReceiver, LocalServerSender,
};
