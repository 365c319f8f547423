pub mod health;
pub mod staged;
pub mod upload;
