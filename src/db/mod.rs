pub mod chunker;
pub mod connection;
pub mod reader;
pub mod reconciler;
pub mod schema;
pub mod session;
pub mod sql_generator;
pub mod type_mapper;
pub mod writer;
