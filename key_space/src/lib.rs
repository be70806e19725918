pub mod error;

use std::{fmt, ops::Index, str::FromStr};

use error::KeySpaceError;

pub const KEY_PREFIX: &str = "key:";

/// Integer range used by `KeyMode::Decimal` unless told otherwise (2^31).
pub const DEFAULT_DECIMAL_MODULUS: u64 = 0x8000_0000;

/// How the key universe is generated. Both modes are pure functions of the
/// key count, so two runs with the same settings preload the same keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// `key:1` .. `key:N`.
    #[default]
    Sequential,
    /// `key:<i mod modulus>` for `i` in `0..N`. Wraps once `N` exceeds the
    /// modulus, so duplicates are expected for large counts.
    Decimal { modulus: u64 },
}

impl KeyMode {
    pub fn decimal() -> Self {
        KeyMode::Decimal {
            modulus: DEFAULT_DECIMAL_MODULUS,
        }
    }

    /// Short label written next to results.
    pub fn label(&self) -> &'static str {
        match self {
            KeyMode::Sequential => "sequential",
            KeyMode::Decimal { .. } => "decimal",
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for KeyMode {
    type Err = KeySpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(KeyMode::Sequential),
            "decimal" | "masstree" => Ok(KeyMode::decimal()),
            other => Err(KeySpaceError::UnknownMode(other.to_string())),
        }
    }
}

/// Ordered, immutable key universe. Built once per run and shared read-only
/// between every phase and worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    keys: Vec<String>,
    mode: KeyMode,
}

impl KeySpace {
    pub fn build(count: u64, mode: KeyMode) -> Result<Self, KeySpaceError> {
        if count == 0 {
            return Err(KeySpaceError::Empty);
        }

        let keys = match mode {
            KeyMode::Sequential => (1..=count).map(format_key).collect(),
            KeyMode::Decimal { modulus } => {
                if modulus == 0 {
                    return Err(KeySpaceError::ZeroModulus);
                }
                (0..count).map(|i| format_key(i % modulus)).collect()
            }
        };

        Ok(Self { keys, mode })
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl Index<usize> for KeySpace {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.keys[index]
    }
}

fn format_key(n: u64) -> String {
    let mut key = String::with_capacity(KEY_PREFIX.len() + 10);
    key.push_str(KEY_PREFIX);
    key.push_str(&n.to_string());
    key
}
