pub mod cache;
pub mod postgres;

pub use cache::{create_redis_client, CacheKey};
pub use postgres::create_pool;
