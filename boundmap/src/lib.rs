//! boundmap: order-preserving async map with a bounded number of transforms in flight.
//!
//! ```no_run
//! # async fn demo() -> Result<(), boundmap::MapError<std::io::Error>> {
//! let doubled = boundmap::map_bounded(
//!     vec![1u64, 2, 3, 4, 5],
//!     |x| async move {
//!         tokio::time::sleep(std::time::Duration::from_millis(x * 100)).await;
//!         Ok::<_, std::io::Error>(x * 2)
//!     },
//!     2,
//! )
//! .await?;
//! assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod mapper;

pub use config::{CONCURRENCY_ENV, Concurrency, MapConfig};
pub use error::{ConfigError, GateError, MapError};
pub use gate::{AdmissionGate, GatePermit, MAX_PERMITS};
pub use mapper::{BoundedMapper, map_bounded};
