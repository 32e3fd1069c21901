pub mod adapter;
pub mod cached;
pub mod memory;
pub mod remote;
