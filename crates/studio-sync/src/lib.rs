//! Single-process async coordination primitives.
//!
//! This crate provides the two serialization tools used by studio services:
//! an advisory FIFO [`Mutex`] for exclusive access to an async critical
//! section, and a [`CriticalSection`] chain that runs queued async work in
//! strict arrival order.
//!
//! Both are cooperative and in-process only; they do not provide
//! cross-process exclusion.

mod critical_section;
mod mutex;

pub use critical_section::CriticalSection;
pub use mutex::{LockGuard, Mutex};
