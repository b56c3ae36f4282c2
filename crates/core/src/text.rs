//! The shared text slot.
//!
//! One process-wide string exchanged between devices: every write replaces
//! the whole value, every read returns a complete value. The store is an
//! explicitly owned instance handed to request handlers; there is no
//! module-level global.

use std::sync::RwLock;

/// A single-slot, concurrently-accessible text store.
///
/// Readers may overlap each other; a writer takes the slot exclusively, so a
/// [`get`](Self::get) always observes the complete value from before or
/// after any concurrent [`set`](Self::set), never a partial one. No history
/// is kept.
#[derive(Debug, Default)]
pub struct TextStore {
    value: RwLock<String>,
}

impl TextStore {
    /// An empty store; [`get`](Self::get) returns `""` until the first set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value.
    ///
    /// Never fails: replacing a `String` is a plain move, so even a lock
    /// poisoned by a panicking reader still holds a complete value.
    pub fn get(&self) -> String {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the value wholesale. The empty string is an explicit clear.
    pub fn set(&self, text: String) {
        *self
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = text;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_empty() {
        assert_eq!(TextStore::new().get(), "");
    }

    #[test]
    fn last_write_wins() {
        let store = TextStore::new();
        store.set("hello".to_string());
        store.set("world".to_string());
        assert_eq!(store.get(), "world");
    }

    #[test]
    fn empty_set_is_an_explicit_clear() {
        let store = TextStore::new();
        store.set("something".to_string());
        store.set(String::new());
        assert_eq!(store.get(), "");
    }

    #[test]
    fn concurrent_readers_and_writers_observe_whole_values() {
        let store = Arc::new(TextStore::new());
        let values: Vec<String> = (0..8).map(|i| format!("value-{i}").repeat(64)).collect();

        let mut handles = Vec::new();
        for value in values.clone() {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    store.set(value.clone());
                }
            }));
        }
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let values = values.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    let seen = store.get();
                    assert!(
                        seen.is_empty() || values.contains(&seen),
                        "observed a value nobody wrote: {seen:?}"
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let final_value = store.get();
        assert!(values.contains(&final_value));
    }
}
