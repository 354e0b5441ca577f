pub mod cost;
pub mod plan;
pub mod planner;
