//! Scripts for deploying the buyback contracts and handing them over to the multisig.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod chain;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod deployments;
pub mod errors;
pub mod executor;
pub mod pending;
mod solidity;
pub mod steps;
pub mod utils;

#[cfg(test)]
mod mock;
