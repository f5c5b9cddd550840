pub mod classify;
pub mod credentials;
pub mod drive;
pub mod error;
pub mod export;
pub mod inventory;
pub mod model;
pub mod mutate;
pub mod paths;
pub mod provider;
pub mod reconcile;
