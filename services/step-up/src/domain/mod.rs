pub mod clock;
pub mod code;
pub mod policy;
pub mod repository;
pub mod types;
