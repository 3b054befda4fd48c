//! Store configuration: connection string parsing and engine limits.

use crate::error::{Error, Result};

/// The embedded file-based driver identifier.
pub const DRIVER_SQLITE: &str = "sqlite";

/// Largest `limit` a select may request. Anything above is an error, not a
/// silent clamp.
pub const SELECT_MAX_LIMIT: i64 = 100_000;
/// Applied when a select passes `limit <= 0`.
pub const SELECT_DEFAULT_LIMIT: i64 = 10_000;

/// Configuration for one app's store engine.
///
/// The connection string has the form `<driver>:<path-or-dsn>`; the path
/// portion goes through environment-variable expansion (`$VAR` and
/// `${VAR}`). Only the sqlite driver is supported at this layer; malformed
/// or unsupported driver prefixes fail at construction time.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Identifier of the owning app, used to derive the table prefix.
    pub app_id: String,
    /// Expanded sqlite database path.
    path: String,
    pub max_select_limit: i64,
    pub default_select_limit: i64,
}

impl StoreConfig {
    pub fn new(connect_string: &str, app_id: impl Into<String>) -> Result<Self> {
        let Some((driver, path)) = connect_string.split_once(':') else {
            return Err(Error::InvalidConnectionString(connect_string.to_string()));
        };

        if driver != DRIVER_SQLITE {
            return Err(Error::UnsupportedDriver(driver.to_string()));
        }

        Ok(Self {
            app_id: app_id.into(),
            path: expand_env(path),
            max_select_limit: SELECT_MAX_LIMIT,
            default_select_limit: SELECT_DEFAULT_LIMIT,
        })
    }

    /// The sqlite database path (after env expansion).
    pub fn database_path(&self) -> &str {
        &self.path
    }

    /// App-scoped prefix for all physical table names.
    pub fn table_prefix(&self) -> String {
        format!("db_{}", self.app_id)
    }
}

/// Expand `$VAR` and `${VAR}` references against the process environment.
/// Unset variables expand to the empty string.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    out.push_str(&std::env::var(&name).unwrap_or_default());
                } else {
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some((_, c)) if c.is_ascii_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some((_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }

    out
}
