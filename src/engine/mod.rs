//! Pluggable bitmap store abstraction
//!
//! The attendance service talks to its store only through [`BitmapStore`].
//! Two implementations exist: `redis::RedisBitmapStore` for production and
//! [`InMemoryBitmapStore`] for tests and local development.

pub mod stubs;
pub mod traits;

pub use stubs::InMemoryBitmapStore;
pub use traits::BitmapStore;
