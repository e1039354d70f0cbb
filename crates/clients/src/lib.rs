#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "r2")]
mod r2;
#[cfg(feature = "local")]
mod local;

#[cfg(feature = "postgres")]
pub use postgres::{connect, create_tables, drop_tables, PostgresClient};
#[cfg(feature = "r2")]
pub use r2::R2Client;
#[cfg(feature = "local")]
pub use local::LocalStorage;
