pub mod config;
pub mod redis_store;

pub use config::CacheConfig;
pub use redis_store::RedisStore;
