//! Low-level package helpers shared by the document layer
pub(crate) mod xml;
pub(crate) mod zip;
