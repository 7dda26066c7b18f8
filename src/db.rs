pub mod user_repo;
pub use user_repo::UserRepository;
pub mod po_repo;
pub use po_repo::PoRepository;
pub mod receipt_repo;
pub use receipt_repo::ReceiptRepository;
pub mod order_repo;
pub use order_repo::OrderRepository;
