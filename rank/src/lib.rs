//! The distributed engine: ranks without shared memory computing blocks of
//! the matrix and merging them pairwise until one rank holds all of it.

pub mod config;
mod driver;
mod error;
mod fabric;
mod layout;
mod mesh;

pub use config::RankSpec;
pub use driver::Rank;
pub use error::{RankErr, Result};
pub use fabric::{Fabric, FabricTemplate, LocalFabric, TcpFabric};
pub use layout::{Layout, Role, Round};
pub use mesh::run_mesh;
