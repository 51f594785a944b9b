//! Protocol Module
//!
//! Defines the line protocol spoken between the relay client and the daemon.
//!
//! ## Protocol Format
//!
//! ### Request Format
//! ```text
//! modprobe http\r\n
//! do <link>\r\n
//! ```
//! One request per connection. The client half-closes after the last line;
//! a blank line also ends the sequence.
//!
//! ### Response Format
//! Unstructured bytes, terminated by the daemon closing the connection.

mod command;
mod response;
mod codec;

pub use command::{Command, CommandLine, DOWNLOAD_VERB, PREAMBLE};
pub use response::Response;
pub use codec::{
    LineCodec, TERMINATOR, DEFAULT_MAX_LINE_BYTES,
    encode_command, decode_command,
    read_command, write_command,
    read_response, write_response,
};
