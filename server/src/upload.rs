use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs;

/// Reduces an uploaded filename to a safe basename: path components are
/// stripped, leading dots dropped, and anything outside `[A-Za-z0-9._-]`
/// replaced, so a hostile name cannot traverse out of the upload directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Writes an accepted upload under `dir` and returns the stored path.
/// Uploads are kept; nothing cleans this directory up.
pub async fn save_upload(dir: &Path, name: &str, data: &[u8]) -> io::Result<PathBuf> {
    let path = dir.join(sanitize_filename(name));
    fs::write(&path, data).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize_filename("dog1.jpg"), "dog1.jpg");
        assert_eq!(sanitize_filename("my-photo_2.PNG"), "my-photo_2.PNG");
    }

    #[test]
    fn neutralizes_traversal_attempts() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename("a/b/../c.png"), "c.png");
    }

    #[test]
    fn replaces_odd_characters_and_hidden_prefixes() {
        assert_eq!(sanitize_filename("sp ace&odd!.gif"), "sp_ace_odd_.gif");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }
}
