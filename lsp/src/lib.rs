//! Language server front end for flowlint.
//!
//! Speaks LSP over any async byte stream (stdio in practice) and drives a
//! [`flowlint_engine`] instance for the lifetime of the session.

pub mod codec;

mod protocol;
mod server;

pub use protocol::{
    ACTIVE_DOCUMENT_METHOD, PathToUriError, SHOW_OUTPUT_METHOD, STATUS_METHOD, path_to_file_uri,
};
pub use server::{ServeOptions, ServerExit, serve};
