// src/io/mod.rs
//
// Base station IO: serial driver, wire codec and the link manager that keeps
// the connection alive.

pub mod codec;
pub mod error;
pub mod link;
pub mod serial;

pub use codec::{Command, VoteCodec, VoteFrame};
pub use error::LinkError;
pub use link::{FrameHandler, LinkManager, LinkState, LinkStatus, ReaderTask};
