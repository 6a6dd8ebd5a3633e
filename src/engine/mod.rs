pub mod lifecycle;
pub mod queries;
pub mod settlement;
