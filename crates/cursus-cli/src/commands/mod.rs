pub mod audit;
pub mod catalog;
pub mod dispatch;
pub mod enrollment;
pub mod progress;
pub mod shared;
pub mod tenant;
