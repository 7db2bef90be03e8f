//! Utility modules for xmlfeed.
//!
//! Contains `QName` handling.

pub mod qname;
