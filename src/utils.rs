use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// File name to save `url` under: its last non-empty path segment, or a
/// generated `download_<uuid>` when the path ends in `/` or is empty.
/// The query string and fragment never contribute.
pub fn get_filename_from_url(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL: {}", url_str))?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("download_{}", uuid::Uuid::new_v4()));
    Ok(name)
}

/// Keeps letters, digits, `.`, `-` and `_`; anything else becomes `_`, so the
/// name is safe to join onto a directory.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '.' | '-' | '_' => c,
            c if c.is_alphanumeric() => c,
            _ => '_',
        })
        .collect()
}

/// Home directory, or the working directory when there is none.
pub fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Picks the output path: an explicit file wins, otherwise the URL's file
/// name inside `dir` (or the default directory).
pub fn resolve_output_path(url: &str, output: Option<&Path>, dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(absolutize(path.to_path_buf()));
    }
    let filename = sanitize_filename(&get_filename_from_url(url)?);
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(default_download_dir);
    Ok(absolutize(dir).join(filename))
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(path);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_ignores_query() {
        let name = get_filename_from_url("https://example.com/pub/iso/disk.img?token=abc").unwrap();
        assert_eq!(name, "disk.img");
    }

    #[test]
    fn trailing_slash_gets_generated_name() {
        let name = get_filename_from_url("https://example.com/pub/").unwrap();
        assert!(name.starts_with("download_"));
    }

    #[test]
    fn invalid_url_is_an_error() {
        assert!(get_filename_from_url("not a url").is_err());
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my file:v2?.tar.gz"), "my_file_v2_.tar.gz");
    }

    #[test]
    fn fragment_and_separators_never_reach_the_name() {
        let name = get_filename_from_url("https://example.com/d/report.pdf#page=2").unwrap();
        assert_eq!(name, "report.pdf");
        assert_eq!(sanitize_filename("übersicht\\..\\x"), "übersicht_.._x");
        assert!(get_filename_from_url("https://example.com").unwrap().starts_with("download_"));
    }

    #[test]
    fn explicit_output_wins() {
        let path = resolve_output_path(
            "https://example.com/a.bin",
            Some(Path::new("/tmp/custom.bin")),
            Some(Path::new("/ignored")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.bin"));
    }

    #[test]
    fn directory_joined_with_url_filename() {
        let path =
            resolve_output_path("https://example.com/files/a%20b.bin", None, Some(Path::new("/data"))).unwrap();
        assert_eq!(path, PathBuf::from("/data/a_20b.bin"));
    }
}
