pub mod health;
pub mod overlay;
