//! Connection descriptors.
//!
//! Turns a compact connection string of the form
//! `user[:password]@host[:port][?key=val&key=val]` into a
//! [`ConnectionDescriptor`]. The `ssh://` scheme is implied when absent.

mod descriptor;

pub use descriptor::{ConnectionDescriptor, DEFAULT_PORT, parse_all};

#[cfg(test)]
mod tests;
