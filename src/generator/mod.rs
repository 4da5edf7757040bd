//! Output generated from sources the site builder doesn't see.

pub mod feed;
