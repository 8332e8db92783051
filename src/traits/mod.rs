//! Core traits for binding resolution.

mod resolver;

pub use resolver::{Resolver, ResolverCore};
