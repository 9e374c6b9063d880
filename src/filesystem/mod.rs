//! Filesystem access rooted at a fixed directory
//!
//! This module handles:
//! - Resolving relative paths against a canonical root
//! - Opening files and directories below that root
//! - Lazy recursive globbing of source files

pub mod resolver;

pub use resolver::{
    DirectoryHandle, FileHandle, GlobIter, Handle, OpenMode, PathResolver, SourcePath,
};
