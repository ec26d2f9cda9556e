//! Asset access.
//!
//! The bootstrap only ever stages whole files (shader text) through the
//! scratch arena; there is no caching or hot-reload layer here.

pub mod file_io;
