#![doc = include_str!("../README.md")]
pub mod cli;
pub mod download;
pub mod error;
pub mod filtering;
pub mod identifiers;
pub mod io;
pub mod pipelines;
pub mod processing;
