pub mod driver;
pub mod event;
pub mod mission;
pub mod position;
