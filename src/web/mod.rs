// Remote status endpoint

pub mod server;

pub use server::StatusServer;
