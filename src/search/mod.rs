pub mod average;
pub mod budget;
pub mod heuristics;
pub mod root;
pub mod score;
pub mod timeman;
