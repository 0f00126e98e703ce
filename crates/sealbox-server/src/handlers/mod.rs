//! HTTP request handlers

pub mod files;
pub mod groups;
pub mod identity;
pub mod shares;

pub use files::*;
pub use groups::*;
pub use identity::*;
pub use shares::*;
