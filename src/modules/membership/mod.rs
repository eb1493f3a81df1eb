pub mod resolver;
pub mod source;
pub mod source_pg;
