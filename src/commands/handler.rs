//! Command Execution
//!
//! Executes parsed commands against the cache table and the statistics
//! aggregator, producing response units for the connection to write.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │   Command ──> dispatch ──> CacheTable / ServerStats         │
//! │                  │                                          │
//! │                  └──> Vec<Response>  (one per wire unit)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A reply is a sequence of protocol units so a multi-key `get` emits each
//! `VALUE` block in key order, misses emitting nothing, with a single
//! trailing `END`. A `noreply` storage command returns no units at all;
//! its side effects and counters still happen.

use crate::protocol::{Command, Response, StoreVerb};
use crate::stats::ServerStats;
use crate::storage::CacheTable;
use std::sync::Arc;

/// Executes commands for one or more connections.
///
/// Cheap to clone; all state lives behind the shared `Arc`s.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<CacheTable>,
    stats: Arc<ServerStats>,
}

impl CommandHandler {
    pub fn new(storage: Arc<CacheTable>, stats: Arc<ServerStats>) -> Self {
        Self { storage, stats }
    }

    /// Runs one command to completion, returning its response units in
    /// wire order. `Quit` is handled by the connection loop and returns
    /// nothing here.
    pub fn execute(&self, command: Command) -> Vec<Response> {
        match command {
            Command::Store {
                verb,
                key,
                flags,
                exptime,
                data,
                noreply,
            } => {
                let stored = match verb {
                    StoreVerb::Set => {
                        // cmd_set counts the set verb only, as the protocol
                        // has always reported it
                        self.stats.record_cmd_set();
                        self.storage.set(&key, data, flags, exptime);
                        true
                    }
                    StoreVerb::Add => self.storage.add(&key, data, flags, exptime),
                    StoreVerb::Replace => self.storage.replace(&key, data, flags, exptime),
                    StoreVerb::Append => self.storage.append(&key, &data),
                    StoreVerb::Prepend => self.storage.prepend(&key, &data),
                };

                if noreply {
                    Vec::new()
                } else if stored {
                    vec![Response::Stored]
                } else {
                    vec![Response::NotStored]
                }
            }

            Command::Get { keys } => {
                self.stats.record_cmd_get();
                let mut units = Vec::with_capacity(keys.len() + 1);
                for key in keys {
                    match self.storage.get(&key) {
                        Some((data, flags)) => {
                            self.stats.record_hit();
                            units.push(Response::Value { key, flags, data });
                        }
                        None => self.stats.record_miss(),
                    }
                }
                units.push(Response::End);
                units
            }

            Command::Delete { key } => {
                if self.storage.delete(&key) {
                    vec![Response::Deleted]
                } else {
                    vec![Response::NotFound]
                }
            }

            Command::FlushAll => {
                self.storage.flush_all();
                vec![Response::Ok]
            }

            Command::Stats => {
                let snapshot = self.stats.snapshot();
                let mut units: Vec<Response> = snapshot
                    .lines()
                    .iter()
                    .map(|&(name, value)| Response::Stat { name, value })
                    .collect();
                units.push(Response::End);
                units
            }

            Command::Quit => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn handler() -> (CommandHandler, Arc<ServerStats>) {
        let stats = Arc::new(ServerStats::new());
        let storage = Arc::new(CacheTable::new(Arc::clone(&stats)));
        (CommandHandler::new(storage, Arc::clone(&stats)), stats)
    }

    fn store(verb: StoreVerb, key: &str, data: &str, noreply: bool) -> Command {
        Command::Store {
            verb,
            key: Bytes::from(key.to_string()),
            flags: 0,
            exptime: 0,
            data: Bytes::from(data.to_string()),
            noreply,
        }
    }

    #[test]
    fn set_then_get() {
        let (h, _) = handler();

        let reply = h.execute(store(StoreVerb::Set, "foo", "bar", false));
        assert_eq!(reply, vec![Response::Stored]);

        let reply = h.execute(Command::Get {
            keys: vec![Bytes::from("foo")],
        });
        assert_eq!(
            reply,
            vec![
                Response::Value {
                    key: Bytes::from("foo"),
                    flags: 0,
                    data: Bytes::from("bar"),
                },
                Response::End,
            ]
        );
    }

    #[test]
    fn add_fails_on_existing_key() {
        let (h, _) = handler();
        assert_eq!(
            h.execute(store(StoreVerb::Add, "k", "v1", false)),
            vec![Response::Stored]
        );
        assert_eq!(
            h.execute(store(StoreVerb::Add, "k", "v2", false)),
            vec![Response::NotStored]
        );
    }

    #[test]
    fn replace_append_prepend_preconditions() {
        let (h, _) = handler();
        assert_eq!(
            h.execute(store(StoreVerb::Replace, "k", "v", false)),
            vec![Response::NotStored]
        );
        assert_eq!(
            h.execute(store(StoreVerb::Append, "k", "v", false)),
            vec![Response::NotStored]
        );
        assert_eq!(
            h.execute(store(StoreVerb::Prepend, "k", "v", false)),
            vec![Response::NotStored]
        );

        h.execute(store(StoreVerb::Set, "k", "a", false));
        assert_eq!(
            h.execute(store(StoreVerb::Append, "k", "b", false)),
            vec![Response::Stored]
        );
        assert_eq!(
            h.execute(store(StoreVerb::Prepend, "k", "c", false)),
            vec![Response::Stored]
        );

        let reply = h.execute(Command::Get {
            keys: vec![Bytes::from("k")],
        });
        assert_eq!(
            reply[0],
            Response::Value {
                key: Bytes::from("k"),
                flags: 0,
                data: Bytes::from("cab"),
            }
        );
    }

    #[test]
    fn noreply_suppresses_units_but_not_effects() {
        let (h, stats) = handler();

        let reply = h.execute(store(StoreVerb::Set, "k", "v", true));
        assert!(reply.is_empty());

        // the value landed and the set was counted
        assert_eq!(stats.snapshot().cmd_set, 1);
        let reply = h.execute(Command::Get {
            keys: vec![Bytes::from("k")],
        });
        assert_eq!(reply.len(), 2);
    }

    #[test]
    fn multi_key_get_interleaves_hits_and_misses() {
        let (h, stats) = handler();
        h.execute(store(StoreVerb::Set, "a", "1", false));
        h.execute(store(StoreVerb::Set, "c", "3", false));

        let reply = h.execute(Command::Get {
            keys: vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")],
        });
        assert_eq!(
            reply,
            vec![
                Response::Value {
                    key: Bytes::from("a"),
                    flags: 0,
                    data: Bytes::from("1"),
                },
                Response::Value {
                    key: Bytes::from("c"),
                    flags: 0,
                    data: Bytes::from("3"),
                },
                Response::End,
            ]
        );

        let snap = stats.snapshot();
        assert_eq!(snap.cmd_get, 1);
        assert_eq!(snap.get_hits, 2);
        assert_eq!(snap.get_misses, 1);
    }

    #[test]
    fn delete_reports_both_outcomes() {
        let (h, _) = handler();
        h.execute(store(StoreVerb::Set, "k", "v", false));

        assert_eq!(
            h.execute(Command::Delete {
                key: Bytes::from("k")
            }),
            vec![Response::Deleted]
        );
        assert_eq!(
            h.execute(Command::Delete {
                key: Bytes::from("k")
            }),
            vec![Response::NotFound]
        );
    }

    #[test]
    fn flush_all_answers_ok() {
        let (h, _) = handler();
        h.execute(store(StoreVerb::Set, "k", "v", false));
        assert_eq!(h.execute(Command::FlushAll), vec![Response::Ok]);

        let reply = h.execute(Command::Get {
            keys: vec![Bytes::from("k")],
        });
        assert_eq!(reply, vec![Response::End]);
    }

    #[test]
    fn stats_emits_every_counter_then_end() {
        let (h, _) = handler();
        let reply = h.execute(Command::Stats);

        assert_eq!(reply.len(), 10);
        assert_eq!(reply.last(), Some(&Response::End));
        assert!(matches!(
            reply[0],
            Response::Stat {
                name: "curr_items",
                ..
            }
        ));
    }

    #[test]
    fn counters_only_count_their_verbs() {
        let (h, stats) = handler();
        h.execute(store(StoreVerb::Set, "k", "v", false));
        h.execute(store(StoreVerb::Add, "k2", "v", false));
        h.execute(store(StoreVerb::Replace, "k", "v2", false));

        // add/replace do not bump cmd_set
        assert_eq!(stats.snapshot().cmd_set, 1);
    }

    #[test]
    fn quit_produces_no_units() {
        let (h, _) = handler();
        assert!(h.execute(Command::Quit).is_empty());
    }
}
