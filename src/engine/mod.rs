pub mod assignment;
pub mod filter;
pub mod lifecycle;
pub mod location;
pub mod scoring;
