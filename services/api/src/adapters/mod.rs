pub mod db;
pub mod memory;
pub mod notifier;
pub mod timeout;

pub use db::DbAdapter;
pub use memory::MemorySessionStore;
pub use notifier::LogNotifier;
pub use timeout::TimeoutStore;
