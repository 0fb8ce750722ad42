//! Remote Procedure Client for the Odoo server.

mod client;
mod trait_def;

pub use client::OdooClient;
pub use trait_def::{OdooRemote, RemoteError, SearchOptions};

#[cfg(test)]
pub use trait_def::MockOdooRemote;
