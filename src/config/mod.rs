//! Layered configuration.
//!
//! Configuration is merged field-by-field from four tiers:
//! 1. **Defaults** - built into the binary
//! 2. **Project** - `$CWD/kanban/config.yaml`
//! 3. **User** - `~/.kanban/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! ## Environment Variables
//! - `KANBAN_CONFIG_PATH` - Explicit config file (replaces tiers 2 and 3)
//! - `KANBAN_DB_PATH` - Database path
//! - `KANBAN_HOST` / `KANBAN_PORT` - HTTP bind address
//! - `KANBAN_CACHE_CAPACITY` - Automation execution cache size
//! - `KANBAN_USER_DIR` - User config dir (default: `~/.kanban`)
//! - `KANBAN_PROJECT_DIR` - Project config dir (default: `./kanban`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
