pub mod card;
pub mod collection;
pub mod config;
pub mod error;
pub mod interleave;
pub mod overdue;
pub mod queue;
pub mod review;
pub mod schedule;
pub mod web;
