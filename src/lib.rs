#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod node;
pub mod registry;

pub mod decode {
    pub mod container;
    pub mod dict;
    pub mod frame;
    pub mod region;
    pub mod segment;
    pub mod skip;
    pub mod sound;
}

pub mod ddi;

pub mod ddb {
    pub mod index;
    pub mod layout;
    pub mod link;
}

pub mod devdb;
pub mod extract;
pub mod pitch;
pub mod progress;

pub mod repack {
    pub mod engine;
    pub mod naming;
    pub mod patch;
}

// Re-exports: stable API surface
pub use ddb::index::DdbIndex;
pub use ddb::link::{Link, Linkage, link_tree};
pub use ddi::load_index;
pub use error::{Error, Result};
pub use node::ChunkNode;
pub use repack::engine::{RepackOptions, RepackOutcome, repack};
