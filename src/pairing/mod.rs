//! Pairing of active pool entries
//!
//! `greedy` computes a conflict-free set of pairs from one pool snapshot and
//! `scheduler` runs that computation on a fixed interval.

pub mod greedy;
pub mod scheduler;

pub use greedy::compute_pairs;
pub use scheduler::PairingScheduler;
