//! poststrat: Survey Post-Stratification Library
//!
//! Re-weights survey answers to a census population by fitting one
//! multinomial model per question on respondent demographics and averaging
//! its predictions over census demographic cells.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
