//! Archival finding aids (EAD)

pub mod node;
pub mod parser;
pub mod session;
pub mod tree;

pub use node::EadNode;
pub use parser::{parse_databases, parse_ead, BasexClient, BasexEadParser, EadDatabase, EadResource, EadSource};
pub use session::EadSessionStore;
pub use tree::{EadTree, FlatEntry};
