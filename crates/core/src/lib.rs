pub mod events;
pub mod models;
pub mod traits;
pub mod validation;

pub use events::*;
pub use models::*;
pub use traits::*;
pub use validation::*;

pub use tokio_util::sync::CancellationToken;
