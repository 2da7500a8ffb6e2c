//! Operator tooling for the CampusBridge course link authenticator.

pub mod cli;
pub mod commands;
pub mod config;
pub mod fixtures;
pub mod observability;
pub mod output;
