pub mod collector;
pub mod counter;
pub mod cpu;
pub mod detail;
pub mod engine;
pub mod filter;
pub mod history;
pub mod memory;
pub mod net;
pub mod platform;
pub mod process;
pub mod snapshot;
pub mod store;
pub mod tree;
