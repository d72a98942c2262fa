//! Redis-backed [`KvStore`].
//!
//! The queue is a list plus a `<list>:members` set. Both mutations run as
//! Lua scripts, so concurrent producers and consumers never see the two
//! structures disagree.

use std::sync::LazyLock;
use std::time::Duration;

use jobscout_core::error::AppError;
use jobscout_core::traits::KvStore;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};

use crate::config::CacheConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SET_MANY_CHUNK: usize = 1000;
const SCAN_COUNT: usize = 500;

static PUSH_UNIQUE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('SADD', KEYS[2], ARGV[1]) == 1 then
  redis.call('RPUSH', KEYS[1], ARGV[1])
  return 1
end
return 0
",
    )
});

static POP: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local value = redis.call('LPOP', KEYS[1])
if value then
  redis.call('SREM', KEYS[2], value)
end
return value
",
    )
});

fn members_key(list: &str) -> String {
    format!("{list}:members")
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

fn redis_err(op: &str) -> impl Fn(RedisError) -> AppError + '_ {
    move |e| {
        if e.is_timeout() {
            AppError::NetworkError(format!("Redis {op} timed out: {e}"))
        } else if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
            AppError::NetworkError(format!("Redis {op} failed: {e}"))
        } else {
            AppError::Generic(format!("Redis {op} failed: {e}"))
        }
    }
}

/// Shared, reconnecting Redis connection. Clones share the connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server answers.
    ///
    /// An unreachable server is [`AppError::QueueUnavailable`]: nothing in
    /// the pipeline can run without the queue.
    pub async fn connect(config: &CacheConfig) -> Result<Self, AppError> {
        let (host, port) = (&config.host, config.port);
        let client = Client::open(config.connection_info())
            .map_err(|e| AppError::ConfigError(format!("Invalid Redis settings: {e}")))?;

        let conn = match tokio::time::timeout(CONNECT_TIMEOUT, client.get_connection_manager())
            .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                return Err(AppError::QueueUnavailable(format!(
                    "Cannot connect to Redis at {host}:{port}: {e}"
                )));
            }
            Err(_) => {
                return Err(AppError::QueueUnavailable(format!(
                    "Connecting to Redis at {host}:{port} timed out"
                )));
            }
        };

        let store = Self { conn };
        store
            .ping()
            .await
            .map_err(|e| AppError::QueueUnavailable(e.to_string()))?;
        tracing::info!(%host, port, "Connected to Redis");
        Ok(store)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn set_cmd(key: &str, value: &str, ttl_secs: u64) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if ttl_secs > 0 {
        cmd.arg("EX").arg(ttl_secs);
    }
    cmd
}

impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(redis_err("GET"))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        let _: () = set_cmd(key, value, ttl_secs)
            .query_async(&mut self.conn())
            .await
            .map_err(redis_err("SET"))?;
        Ok(())
    }

    async fn set_many(&self, keys: &[String], value: &str, ttl_secs: u64) -> Result<(), AppError> {
        let mut conn = self.conn();
        for chunk in keys.chunks(SET_MANY_CHUNK) {
            let mut pipe = redis::pipe();
            for key in chunk {
                pipe.add_command(set_cmd(key, value, ttl_secs)).ignore();
            }
            let _: () = pipe
                .query_async(&mut conn)
                .await
                .map_err(redis_err("pipelined SET"))?;
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let mut conn = self.conn();
        let pattern = glob_escape(prefix);
        let mut cursor: u64 = 0;
        let mut deleted = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(redis_err("SCAN"))?;

            if !keys.is_empty() {
                let removed: usize = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(redis_err("DEL"))?;
                deleted += removed;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(deleted)
    }

    async fn push_unique(&self, list: &str, value: &str) -> Result<bool, AppError> {
        let added: i64 = PUSH_UNIQUE
            .key(list)
            .key(members_key(list))
            .arg(value)
            .invoke_async(&mut self.conn())
            .await
            .map_err(redis_err("enqueue"))?;
        Ok(added == 1)
    }

    async fn pop(&self, list: &str) -> Result<Option<String>, AppError> {
        let value: Option<String> = POP
            .key(list)
            .key(members_key(list))
            .invoke_async(&mut self.conn())
            .await
            .map_err(redis_err("dequeue"))?;
        Ok(value)
    }

    async fn length(&self, list: &str) -> Result<usize, AppError> {
        let len: usize = redis::cmd("LLEN")
            .arg(list)
            .query_async(&mut self.conn())
            .await
            .map_err(redis_err("LLEN"))?;
        Ok(len)
    }

    async fn clear_list(&self, list: &str) -> Result<(), AppError> {
        let _: usize = redis::cmd("DEL")
            .arg(list)
            .arg(members_key(list))
            .query_async(&mut self.conn())
            .await
            .map_err(redis_err("DEL"))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        let _: String = redis::cmd("PING")
            .query_async(&mut self.conn())
            .await
            .map_err(redis_err("PING"))?;
        Ok(())
    }
}
