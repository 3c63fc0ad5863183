pub mod address;
pub mod block;
pub mod bytes;
pub mod errors;
pub mod events;
pub mod pagination;

pub use address::*;
pub use block::*;
pub use bytes::hex_bytes;
pub use errors::*;
pub use events::*;
pub use pagination::*;
