//! Integration tests for the token commitment and transfer core.

pub mod support;

#[cfg(test)]
mod mint_tests;
#[cfg(test)]
mod proof_tests;
#[cfg(test)]
mod transfer_tests;
#[cfg(test)]
mod txf_tests;
