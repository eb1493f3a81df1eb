pub mod engine;
pub mod handle;
pub mod model;
pub mod push;
pub mod repository;
pub mod repository_pg;
pub mod route;
pub mod schema;
