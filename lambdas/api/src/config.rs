use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use domain::{medicines::Medicine, store::Tables, users::User};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backend {
    DynamoDb,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub tables: Tables,
    /// Users and medicines loaded into the memory backend at startup.
    pub seed_file: Option<PathBuf>,
    /// Serve over plain TCP instead of the Lambda runtime.
    pub local_bind_addr: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("dynamodb") => Backend::DynamoDb,
            Some("memory") => Backend::Memory,
            Some(other) => bail!("unknown STORE_BACKEND {other:?}, expected dynamodb or memory"),
        };

        let defaults = Tables::default();
        let tables = Tables {
            users: lookup("DYNAMODB_USERS_TABLE").unwrap_or(defaults.users),
            medicines: lookup("DYNAMODB_MEDICINES_TABLE").unwrap_or(defaults.medicines),
            prescriptions: lookup("DYNAMODB_PRESCRIPTIONS_TABLE")
                .unwrap_or(defaults.prescriptions),
        };

        Ok(Self {
            backend,
            tables,
            seed_file: lookup("SEED_FILE").map(PathBuf::from),
            local_bind_addr: lookup("LOCAL_BIND_ADDR"),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
}

pub fn load_seed(path: &Path) -> Result<Seed> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))
}
