use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use sha2::Digest as _;
use url::Url;

pub const HASH_PREFIX_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub content_hash: String,
    pub file_name: String,
    pub byte_len: u64,
    pub newly_written: bool,
}

/// Content-addressed image directory. File names are a fixed-length hex
/// prefix of the SHA-256 content digest plus the source extension, so
/// identical bytes collapse to one file no matter how many URLs serve them,
/// and the dedup check is a plain existence test.
#[derive(Debug)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create image dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.dir.join(file_name).exists()
    }

    pub fn store(
        &self,
        url: &Url,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> anyhow::Result<StoredImage> {
        let content_hash = content_hash(bytes);
        let file_name = match file_extension(url, content_type) {
            Some(ext) => format!("{content_hash}.{ext}"),
            None => content_hash.clone(),
        };

        let target = self.dir.join(&file_name);
        if target.exists() {
            tracing::debug!(file = %file_name, "image content already stored");
            return Ok(StoredImage {
                content_hash,
                file_name,
                byte_len: bytes.len() as u64,
                newly_written: false,
            });
        }

        // Staged in the same directory; the rename is atomic, so concurrent
        // runs sharing this directory never see a partial file.
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("create temp file in {}", self.dir.display()))?;
        temp.write_all(bytes)
            .with_context(|| format!("write image bytes: {file_name}"))?;
        temp.persist(&target)
            .with_context(|| format!("persist image file: {}", target.display()))?;

        Ok(StoredImage {
            content_hash,
            file_name,
            byte_len: bytes.len() as u64,
            newly_written: true,
        })
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_PREFIX_LEN);
    hash
}

/// Extension from the URL path when it looks like one, else mapped from the
/// response media type, else none.
fn file_extension(url: &Url, content_type: Option<&str>) -> Option<String> {
    if let Some(ext) = Path::new(url.path()).extension().and_then(|e| e.to_str())
        && !ext.is_empty()
        && ext.len() <= 5
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Some(ext.to_ascii_lowercase());
    }

    match content_type? {
        "image/png" => Some("png".to_owned()),
        "image/jpeg" => Some("jpg".to_owned()),
        "image/gif" => Some("gif".to_owned()),
        "image/webp" => Some("webp".to_owned()),
        "image/svg+xml" => Some("svg".to_owned()),
        "image/avif" => Some("avif".to_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(input: &str) -> Url {
        Url::parse(input).expect("parse test url")
    }

    #[test]
    fn identical_bytes_from_different_urls_share_one_file() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ImageStore::open(temp.path())?;
        let bytes = b"not really a png";

        let first = store.store(&url("https://a.example/one.png"), None, bytes)?;
        let second = store.store(&url("https://b.example/two.png"), None, bytes)?;

        assert_eq!(first.file_name, second.file_name);
        assert!(first.newly_written);
        assert!(!second.newly_written);
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn different_bytes_get_different_files() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ImageStore::open(temp.path())?;

        let first = store.store(&url("https://a.example/one.png"), None, b"first")?;
        let second = store.store(&url("https://a.example/one.png"), None, b"second")?;

        assert_ne!(first.file_name, second.file_name);
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 2);
        Ok(())
    }

    #[test]
    fn file_name_is_hash_prefix_plus_extension() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ImageStore::open(temp.path())?;

        let stored = store.store(&url("https://a.example/art/piece.PNG"), None, b"bytes")?;
        let (stem, ext) = stored.file_name.split_once('.').expect("name has extension");
        assert_eq!(stem.len(), HASH_PREFIX_LEN);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ext, "png");
        assert_eq!(stem, stored.content_hash);
        Ok(())
    }

    #[test]
    fn extension_falls_back_to_content_type() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ImageStore::open(temp.path())?;

        let stored = store.store(
            &url("https://a.example/download?id=7"),
            Some("image/jpeg"),
            b"bytes",
        )?;
        assert!(stored.file_name.ends_with(".jpg"));

        let bare = store.store(
            &url("https://a.example/download?id=8"),
            Some("application/octet-stream"),
            b"other bytes",
        )?;
        assert!(!bare.file_name.contains('.'));
        Ok(())
    }

    #[test]
    fn contains_reflects_stored_files() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ImageStore::open(temp.path())?;

        let stored = store.store(&url("https://a.example/one.png"), None, b"bytes")?;
        assert!(store.contains(&stored.file_name));
        assert!(!store.contains("0000000000000000.png"));
        Ok(())
    }
}
