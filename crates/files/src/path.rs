//! Turning remote names into safe local paths.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

// Look-alikes for characters that are illegal (or a separator) in a path
// segment on at least one common platform. Same choices as gallery-dl.
const REPLACEMENTS: [(char, char); 9] = [
    ('\\', '⧹'),
    ('/', '⧸'),
    ('|', '￨'),
    (':', '꞉'),
    ('*', '∗'),
    ('?', '？'),
    ('"', '″'),
    ('<', '﹤'),
    ('>', '﹥'),
];

/// Make a remote display name usable as a single path segment.
///
/// Path-illegal characters are swapped for visually similar Unicode ones, so
/// `"Week 1: Intro/Overview"` stays readable as `"Week 1꞉ Intro⧸Overview"`.
/// NUL bytes are dropped, and the special segments `.` and `..` (or an empty
/// name) become full-width dots so they can never mean "here" or "up".
///
/// # Examples
///
/// ```
/// use mirror_files::sanitize;
/// assert_eq!(sanitize("Slides: Week 1/2"), "Slides꞉ Week 1⧸2");
/// assert_eq!(sanitize("notes.pdf"), "notes.pdf");
/// assert_eq!(sanitize(".."), "．．");
/// ```
pub fn sanitize(segment: &str) -> String {
    let sanitized: String = segment
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| REPLACEMENTS.iter().find(|(from, _)| *from == c).map_or(c, |(_, to)| *to))
        .collect();
    match sanitized.as_str() {
        "" => "．".to_string(),
        "." | ".." => sanitized.replace('.', "．"),
        _ => sanitized,
    }
}

/// The name `path` takes when its plain name is held by another resource:
/// the resource id is appended to the stem, before any extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mirror_files::qualify;
/// assert_eq!(qualify(Path::new("12/course files/a.txt"), 200), Path::new("12/course files/a~200.txt"));
/// ```
pub fn qualify(path: &Path, id: u64) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let qualified = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}~{id}.{extension}"),
        _ => format!("{name}~{id}"),
    };
    path.with_file_name(qualified)
}

/// Validates a mirror path. Ensures that paths don't escape the mirror root
/// (no `..` traversal past it) and aren't empty.
///
/// Returns the normalized relative path, or
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mirror_files::validate_path;
/// assert!(validate_path("12/course files/notes.pdf").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(validate_path("/12/./week 1//notes.pdf").unwrap(), Path::new("12/week 1/notes.pdf"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // NUL passes through Path::components() on Unix but truncates in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Lecture 1", "Lecture 1")]
    #[case(r#"a\b/c|d:e*f?g"h<i>j"#, "a⧹b⧸c￨d꞉e∗f？g″h﹤i﹥j")]
    #[case("nul\0byte", "nulbyte")]
    #[case("", "．")]
    #[case(".", "．")]
    #[case("...", "...")]
    #[case(".hidden", ".hidden")]
    fn test_sanitize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    #[rstest]
    #[case("1/a.txt", "1/a~7.txt")]
    #[case("1/archive.tar.gz", "1/archive.tar~7.gz")]
    #[case("1/README", "1/README~7")]
    #[case("1/.bashrc", "1/.bashrc~7")]
    fn test_qualify(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(qualify(Path::new(input), 7), Path::new(expected));
    }

    #[test]
    fn test_sanitized_segment_is_one_component() {
        let segment = sanitize("../../etc/passwd");
        assert_eq!(Path::new(&segment).components().count(), 1);
        assert!(validate(Path::new("12").join(&segment)).is_ok());
    }

    #[rstest]
    #[case("12/course files/a.pdf", "12/course files/a.pdf")]
    #[case("a//b/./c/", "a/b/c")]
    #[case("a/b/..", "a")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a\0b")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
