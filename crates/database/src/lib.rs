mod init;
mod sqlx_postgres;

pub use sqlx_postgres::*;
pub use storymint_db_macros::SqlxObject;

#[doc(hidden)]
pub use sqlx;
#[doc(hidden)]
pub use tokio;
#[doc(hidden)]
pub use tracing;
