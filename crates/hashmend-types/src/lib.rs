pub mod api;
pub mod context;
pub mod error;
pub mod verdict;
