#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod aggregate;
pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod kb;
pub mod lookup;
pub mod memory;
pub mod traits;
pub mod types;
pub mod vector;
