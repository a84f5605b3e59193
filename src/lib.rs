// Library root
// -----------
// This crate exposes the library surface behind the `uclip` binary.
// `main.rs` parses the command line and hands off to `ui`.
//
// Module responsibilities:
// - `naming`: picks a free object key (requested or random name) and
//   builds the public URL for it.
// - `store`: the `ObjectStore` trait the naming and upload logic talks to.
// - `api`: Backblaze B2 implementation of `ObjectStore` over blocking HTTP.
// - `uploader`: ties naming and storage together for upload and delete.
// - `config`: validated settings and their persistence on disk.
// - `clipboard`, `cli`, `ui`: terminal and desktop glue.
pub mod api;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod naming;
pub mod store;
pub mod ui;
pub mod uploader;

pub use error::{Error, Result};
