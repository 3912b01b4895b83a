// Database layer module
// PostgreSQL connection pool used by the postgres storage backend

pub mod pool;

pub use pool::DbPool;
