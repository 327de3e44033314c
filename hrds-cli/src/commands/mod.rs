pub mod batch;
pub mod buffer;
pub mod info;
pub mod query;
