use alloy::primitives::Address;
use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::warn;

const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub connected_account: Option<String>,
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
}

/// Last connected account, kept on disk so the next launch can reconnect
/// without prompting.
#[derive(Clone, Debug)]
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored account. A missing, unreadable or malformed file
    /// reads as no account.
    pub fn load(&self) -> Option<Address> {
        let record = match read_record(&self.path) {
            Ok(record) => record?,
            Err(err) => {
                warn!(?err, path = %self.path.display(), "ignoring unreadable session file");
                return None;
            }
        };
        let raw = record.connected_account?;
        match raw.parse() {
            Ok(address) => Some(address),
            Err(err) => {
                warn!(%err, %raw, "ignoring malformed stored account");
                None
            }
        }
    }

    pub fn save(&self, account: Address) -> Result<()> {
        let record = StoredSession {
            connected_account: Some(account.to_string()),
            connected_at: Some(Utc::now()),
        };
        write_record(&self.path, &record)
    }

    pub fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        write_record(&self.path, &StoredSession::default())
    }
}

fn read_record(path: &Path) -> Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path).wrap_err("Failed to read session file")?;
    if data.is_empty() {
        return Ok(None);
    }
    let record = serde_json::from_slice(&data).wrap_err("Failed to parse session file")?;
    Ok(Some(record))
}

fn write_record(path: &Path, record: &StoredSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(record).wrap_err("Failed to serialize session")?;
    fs::write(path, json).wrap_err("Failed to write session file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn sut__load_returns_saved_account() {
        // given
        let tmp = TempDir::new("account-store").unwrap();
        let sut = AccountStore::new(tmp.path());
        let account = Address::repeat_byte(0x42);

        // when
        sut.save(account).unwrap();

        // then
        assert_eq!(sut.load(), Some(account));
    }

    #[test]
    fn sut__clear_forgets_account() {
        // given
        let tmp = TempDir::new("account-store").unwrap();
        let sut = AccountStore::new(tmp.path());
        sut.save(Address::repeat_byte(0x42)).unwrap();

        // when
        sut.clear().unwrap();

        // then
        assert_eq!(sut.load(), None);
    }

    #[test]
    fn sut__load_tolerates_missing_and_corrupt_files() {
        // given
        let tmp = TempDir::new("account-store").unwrap();
        let sut = AccountStore::new(tmp.path().join("nested"));

        // then
        assert_eq!(sut.load(), None);

        // when
        fs::create_dir_all(tmp.path().join("nested")).unwrap();
        fs::write(sut.path(), b"{not json").unwrap();

        // then
        assert_eq!(sut.load(), None);
    }

    #[test]
    fn sut__writes_connected_account_key() {
        // given
        let tmp = TempDir::new("account-store").unwrap();
        let sut = AccountStore::new(tmp.path());

        // when
        sut.save(Address::repeat_byte(0x42)).unwrap();

        // then
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(sut.path()).unwrap()).unwrap();
        assert!(raw["connected_account"].is_string());
    }
}
