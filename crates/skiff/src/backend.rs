//! Transport backends.
//!
//! Only the SSH backend ships today; it implements the traits in
//! [`crate::transport`] on top of `russh` and `russh-sftp`.

pub mod ssh;
