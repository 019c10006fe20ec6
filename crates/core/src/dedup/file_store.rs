//! Newline-delimited file backend.
//!
//! Layout under the state directory:
//! - `keywords/<stem>.txt`: channel ids judged for one keyword (append-only)
//! - `keywords/<stem>.token`: continuation token where the keyword's search
//!   stopped, absent once pagination is exhausted
//! - `global_urls.txt`: channel URLs written to the result sink

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{keyword_file_stem, normalize_keyword, DedupError, DedupRepository};

const GLOBAL_FILE: &str = "global_urls.txt";
const KEYWORD_DIR: &str = "keywords";

struct Inner {
    per_keyword: HashMap<String, HashSet<String>>,
    global: HashSet<String>,
}

/// File-backed dedup repository with in-memory mirrors of both scopes.
pub struct FileDedupRepository {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl FileDedupRepository {
    /// Open (creating if needed) the state directory and load the global set.
    pub fn open(root: &Path) -> Result<Self, DedupError> {
        fs::create_dir_all(root.join(KEYWORD_DIR))?;
        let global = read_lines(&root.join(GLOBAL_FILE))?;
        debug!(count = global.len(), "Loaded global URL set from disk");

        Ok(Self {
            root: root.to_path_buf(),
            inner: Mutex::new(Inner {
                per_keyword: HashMap::new(),
                global,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn keyword_path(&self, keyword: &str) -> PathBuf {
        self.root
            .join(KEYWORD_DIR)
            .join(format!("{}.txt", keyword_file_stem(keyword)))
    }

    fn token_path(&self, keyword: &str) -> PathBuf {
        self.root
            .join(KEYWORD_DIR)
            .join(format!("{}.token", keyword_file_stem(keyword)))
    }

    fn global_path(&self) -> PathBuf {
        self.root.join(GLOBAL_FILE)
    }

    /// Load a keyword's set on first use.
    fn keyword_set<'a>(
        &self,
        inner: &'a mut Inner,
        keyword: &str,
    ) -> Result<&'a mut HashSet<String>, DedupError> {
        let key = normalize_keyword(keyword);
        if !inner.per_keyword.contains_key(&key) {
            let seen = read_lines(&self.keyword_path(keyword))?;
            inner.per_keyword.insert(key.clone(), seen);
        }
        Ok(inner.per_keyword.entry(key).or_default())
    }
}

impl DedupRepository for FileDedupRepository {
    fn has_seen_for_keyword(&self, keyword: &str, channel_id: &str) -> Result<bool, DedupError> {
        let mut inner = self.lock();
        Ok(self.keyword_set(&mut inner, keyword)?.contains(channel_id))
    }

    fn record_seen_for_keyword(&self, keyword: &str, channel_id: &str) -> Result<(), DedupError> {
        let mut inner = self.lock();
        let path = self.keyword_path(keyword);
        let set = self.keyword_set(&mut inner, keyword)?;
        if set.contains(channel_id) {
            return Ok(());
        }
        append_line(&path, channel_id)?;
        set.insert(channel_id.to_string());
        Ok(())
    }

    fn has_global_url(&self, url: &str) -> Result<bool, DedupError> {
        Ok(self.lock().global.contains(url))
    }

    fn record_global_url(&self, url: &str) -> Result<(), DedupError> {
        let mut inner = self.lock();
        // Visible in memory even if the append below fails.
        if !inner.global.insert(url.to_string()) {
            return Ok(());
        }
        append_line(&self.global_path(), url)
    }

    fn replace_global_urls(&self, urls: Vec<String>) -> Result<usize, DedupError> {
        let mut inner = self.lock();
        let set: HashSet<String> = urls.into_iter().filter(|u| !u.is_empty()).collect();

        let tmp = self.root.join(format!("{}.tmp", GLOBAL_FILE));
        {
            let mut file = File::create(&tmp)?;
            for url in &set {
                writeln!(file, "{}", url)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, self.global_path())?;

        let count = set.len();
        inner.global = set;
        Ok(count)
    }

    fn global_len(&self) -> usize {
        self.lock().global.len()
    }

    fn resume_token(&self, keyword: &str) -> Result<Option<String>, DedupError> {
        let _inner = self.lock();
        match fs::read_to_string(self.token_path(keyword)) {
            Ok(token) => {
                let token = token.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store_resume_token(&self, keyword: &str, token: Option<&str>) -> Result<(), DedupError> {
        let _inner = self.lock();
        let path = self.token_path(keyword);
        match token {
            Some(token) => fs::write(&path, token)?,
            None => match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

fn read_lines(path: &Path) -> Result<HashSet<String>, DedupError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut set = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            set.insert(line.to_string());
        }
    }
    Ok(set)
}

fn append_line(path: &Path, value: &str) -> Result<(), DedupError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", value)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_seen_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo = FileDedupRepository::open(dir.path()).unwrap();

        repo.record_seen_for_keyword("robotics", "UC1").unwrap();
        repo.record_seen_for_keyword("robotics", "UC1").unwrap();

        assert!(repo.has_seen_for_keyword("robotics", "UC1").unwrap());
        let contents = fs::read_to_string(repo.keyword_path("robotics")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_keyword_scopes_are_independent() {
        let dir = TempDir::new().unwrap();
        let repo = FileDedupRepository::open(dir.path()).unwrap();

        repo.record_seen_for_keyword("robotics", "UC1").unwrap();

        assert!(repo.has_seen_for_keyword("Robotics ", "UC1").unwrap());
        assert!(!repo.has_seen_for_keyword("drones", "UC1").unwrap());
        assert!(!repo.has_global_url("https://www.youtube.com/channel/UC1").unwrap());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let repo = FileDedupRepository::open(dir.path()).unwrap();
            repo.record_seen_for_keyword("robotics", "UC1").unwrap();
            repo.record_global_url("https://www.youtube.com/channel/UC9").unwrap();
        }

        let repo = FileDedupRepository::open(dir.path()).unwrap();
        assert!(repo.has_seen_for_keyword("robotics", "UC1").unwrap());
        assert!(repo.has_global_url("https://www.youtube.com/channel/UC9").unwrap());
        assert_eq!(repo.global_len(), 1);
    }

    #[test]
    fn test_failed_global_append_still_blocks_url() {
        let dir = TempDir::new().unwrap();
        let repo = FileDedupRepository::open(dir.path()).unwrap();
        // A directory in place of the file makes every append fail.
        fs::create_dir(dir.path().join(GLOBAL_FILE)).unwrap();

        let url = "https://www.youtube.com/channel/UC1";
        assert!(repo.record_global_url(url).is_err());
        assert!(repo.has_global_url(url).unwrap());
        assert!(repo.record_global_url(url).is_ok());
    }

    #[test]
    fn test_resume_token_survives_reopen_and_clears() {
        let dir = TempDir::new().unwrap();
        {
            let repo = FileDedupRepository::open(dir.path()).unwrap();
            assert_eq!(repo.resume_token("robotics").unwrap(), None);
            repo.store_resume_token("robotics", Some("CAUQAA")).unwrap();
        }

        let repo = FileDedupRepository::open(dir.path()).unwrap();
        assert_eq!(
            repo.resume_token("Robotics").unwrap(),
            Some("CAUQAA".to_string())
        );
        repo.store_resume_token("robotics", None).unwrap();
        repo.store_resume_token("robotics", None).unwrap();
        assert_eq!(repo.resume_token("robotics").unwrap(), None);
    }

    #[test]
    fn test_replace_global_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let repo = FileDedupRepository::open(dir.path()).unwrap();
        repo.record_global_url("https://old").unwrap();

        let count = repo
            .replace_global_urls(vec![
                "https://a".to_string(),
                "https://b".to_string(),
                "https://a".to_string(),
                String::new(),
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert!(!repo.has_global_url("https://old").unwrap());
        assert!(repo.has_global_url("https://b").unwrap());

        let reopened = FileDedupRepository::open(dir.path()).unwrap();
        assert_eq!(reopened.global_len(), 2);
    }
}
