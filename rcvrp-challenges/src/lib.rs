pub mod vehicle_routing;
pub use vehicle_routing::{Challenge, Difficulty, Solution};
