mod client;
mod env;
mod time;

pub use client::ModuleClient;
pub use env::{load_dotenv, EnvVars};
pub use time::{get_current_iso_timestamp, get_current_timestamp};

#[doc(hidden)]
pub use async_trait::async_trait;
#[doc(hidden)]
pub use tracing;
