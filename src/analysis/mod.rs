pub mod aggregate;
pub mod anomaly;
pub mod folders;
pub mod monthly;
pub mod opportunity;
pub mod segment;
