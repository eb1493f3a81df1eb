pub mod handle;
pub mod registry;
pub mod route;
