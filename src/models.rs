pub mod auth;
pub mod order;
pub mod po;
pub mod receipt;
pub mod workorder;
