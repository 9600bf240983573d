//! `plugin-index` library.

pub mod archive;
pub mod artifact;
pub mod commands;
pub mod component;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod pack;
pub mod publish;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod version;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use archive::*;
pub use artifact::*;
pub use commands::*;
pub use component::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use pack::*;
pub use publish::*;
pub use reconcile::*;
pub use session::*;
pub use store::*;
pub use version::*;
