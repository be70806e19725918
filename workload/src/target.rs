use std::{fmt, str::FromStr};

use crate::error::ConfigError;

/// One server endpoint under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
}

impl Operation {
    /// Base seed for the per-worker generators of a cell running this operation.
    pub fn base_seed(&self) -> u64 {
        match self {
            Operation::Get => 0xC0FFEE,
            Operation::Set => 0xC0FFEE ^ 0x1234,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Operation::Get),
            "set" | "put" => Ok(Operation::Set),
            _ => Err(ConfigError::UnknownOperation(s.to_string())),
        }
    }
}
