mod kill_log;

pub use kill_log::{ExpiryQueue, KillLogEntry, append_entry, remove_entries};
