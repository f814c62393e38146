pub mod geometry;
pub mod ids;
pub mod task;
