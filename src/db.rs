//! On-disk snapshots of the persistent stores.
//!
//! One YAML file per store, rewritten atomically (temp file + rename) after
//! a mutation.  Sessions, chat focus, live rooms and unread counters are
//! runtime-only and never written to disk.

use crate::auth::User;
use crate::group::Group;
use crate::history::{Conversation, PairKey};
use crate::{GroupId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UsersFile {
    pub next_user_id: UserId,
    pub users: Vec<User>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FriendsFile {
    /// Normalized friendship edges.
    pub friendships: Vec<(UserId, UserId)>,
    /// Directed pending invites, `(from, to)`.
    pub invites: Vec<(UserId, UserId)>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GroupsFile {
    pub next_group_id: GroupId,
    pub groups: Vec<Group>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PmsFile {
    pub conversations: Vec<(PairKey, Conversation)>,
}

/// Handle on the data directory.
pub struct Db {
    dir: PathBuf,
}

impl Db {
    /// Opens (and creates if needed) the data directory.
    pub fn open(dir: &Path) -> io::Result<Db> {
        fs::create_dir_all(dir)?;
        Ok(Db {
            dir: dir.to_owned(),
        })
    }

    pub fn load_users(&self) -> io::Result<Option<UsersFile>> {
        load(&self.dir.join("users.yaml"))
    }

    pub fn save_users(&self, users: &UsersFile) -> io::Result<()> {
        save(&self.dir.join("users.yaml"), users)
    }

    pub fn load_friends(&self) -> io::Result<Option<FriendsFile>> {
        load(&self.dir.join("friends.yaml"))
    }

    pub fn save_friends(&self, friends: &FriendsFile) -> io::Result<()> {
        save(&self.dir.join("friends.yaml"), friends)
    }

    pub fn load_groups(&self) -> io::Result<Option<GroupsFile>> {
        load(&self.dir.join("groups.yaml"))
    }

    pub fn save_groups(&self, groups: &GroupsFile) -> io::Result<()> {
        save(&self.dir.join("groups.yaml"), groups)
    }

    pub fn load_pms(&self) -> io::Result<Option<PmsFile>> {
        load(&self.dir.join("pms.yaml"))
    }

    pub fn save_pms(&self, pms: &PmsFile) -> io::Result<()> {
        save(&self.dir.join("pms.yaml"), pms)
    }
}

/// Reads a store file.  A missing file is a fresh store, not an error.
fn load<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Writes a store file atomically.
fn save<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let contents = serde_yaml::to_string(value)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
