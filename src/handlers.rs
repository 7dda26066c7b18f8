pub mod auth;
pub mod lifecycle;
pub mod receiving;
pub mod workorders;
