pub mod auth;
pub mod po_service;
pub mod receive_service;
pub mod workorder_service;
