//! Building blocks shared by the build steps.

pub mod command;
pub mod date;
pub mod excerpt;
pub mod frontmatter;
pub mod inject;
