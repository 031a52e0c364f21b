//! Timed polls: published questions, one vote per account inside each
//! question's voting window, and results tallied from the stored votes.

pub mod audit;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod routes;
pub mod session;
pub mod support;
#[cfg(test)]
mod testing;
