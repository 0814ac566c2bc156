//! Argument-list wire format for solo named channels.
//!
//! One connection carries exactly one message:
//! - The payload is a UTF-8 JSON array of strings
//! - The sender closes its write side to mark the end of the message
//!
//! There is no length prefix, version field, or acknowledgement. Readers
//! bound the payload size so a misbehaving sender cannot exhaust memory.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_args, encode_args, WireConfig, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::{Result, WireError};
pub use reader::MessageReader;
pub use writer::MessageWriter;
