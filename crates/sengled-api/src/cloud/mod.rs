// Sengled cloud HTTPS client
//
// Credential login, session probing, server discovery, and device
// endpoints. The transport mechanics live in `client`; each endpoint
// group adds inherent methods from its own file.

pub mod auth;
pub mod client;
pub mod devices;
pub mod models;
pub mod server;

pub use client::CloudClient;
