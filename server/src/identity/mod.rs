pub mod registration;
pub mod store;

pub use store::IdentityStore;
