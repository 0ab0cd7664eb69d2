//! Loading browser-exported `cookies.txt` files (Netscape/Mozilla format).
//!
//! Each non-comment line holds seven tab-separated fields:
//! `domain`, `include_subdomains`, `path`, `secure`, `expires`, `name`, `value`.
//! Lines prefixed with `#HttpOnly_` are cookies, not comments.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use reqwest::cookie::Jar;
use std::path::Path;
use url::Url;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix timestamp; `None` for session cookies (`0`).
    pub expires: Option<i64>,
    pub name: String,
    pub value: String,
}
impl Cookie {
    /// The `Set-Cookie` header that would have produced this cookie.
    ///
    /// Expiry is deliberately left out: exported session cookies are usually
    /// "expired" by the time anyone runs a sync, and the server is the judge
    /// of whether they still work.
    fn header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.include_subdomains {
            header.push_str(&format!("; Domain={}", self.host()));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }

    fn host(&self) -> &str {
        self.domain.trim_start_matches('.')
    }

    fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}{}", self.host(), self.path)).ok()
    }
}

/// Parse the contents of a `cookies.txt` file.
///
/// Returns [`Cookie`](ErrorKind::Cookie) with the (1-based) line number of
/// the first malformed line.
pub fn parse(contents: &str) -> Result<Vec<Cookie>> {
    let mut cookies = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [domain, include_subdomains, path, secure, expires, name, value] = fields[..] else {
            exn::bail!(ErrorKind::Cookie(line_number));
        };
        let expires = expires.trim().parse::<i64>().or_raise(|| ErrorKind::Cookie(line_number))?;
        cookies.push(Cookie {
            domain: domain.to_string(),
            include_subdomains: flag(include_subdomains).ok_or_raise(|| ErrorKind::Cookie(line_number))?,
            path: path.to_string(),
            secure: flag(secure).ok_or_raise(|| ErrorKind::Cookie(line_number))?,
            http_only,
            expires: (expires != 0).then_some(expires),
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(cookies)
}

fn flag(field: &str) -> Option<bool> {
    match field.trim() {
        f if f.eq_ignore_ascii_case("TRUE") => Some(true),
        f if f.eq_ignore_ascii_case("FALSE") => Some(false),
        _ => None,
    }
}

/// Fill a cookie jar from the file at `path`.
pub async fn load(path: impl AsRef<Path>) -> Result<Jar> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await.or_raise(|| ErrorKind::CookieFile(path.to_path_buf()))?;
    let cookies = parse(&contents).or_raise(|| ErrorKind::CookieFile(path.to_path_buf()))?;
    let jar = Jar::default();
    let mut loaded = 0_usize;
    for cookie in &cookies {
        match cookie.origin() {
            Some(origin) => {
                jar.add_cookie_str(&cookie.header(), &origin);
                loaded += 1;
            },
            None => tracing::warn!(domain = %cookie.domain, name = %cookie.name, "Skipping cookie with unusable domain"),
        }
    }
    tracing::debug!(path = %path.display(), loaded, "Loaded cookies");
    Ok(jar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FILE: &str = "# Netscape HTTP Cookie File\n\
        # This is a generated file! Do not edit.\n\
        \n\
        .school.example.com\tTRUE\t/\tTRUE\t0\tlog_session_id\tabc123\n\
        #HttpOnly_school.example.com\tFALSE\t/\tTRUE\t1924992000\tcanvas_session\txyz\n";

    #[test]
    fn test_parse() {
        let cookies = parse(FILE).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies[0],
            Cookie {
                domain: ".school.example.com".to_string(),
                include_subdomains: true,
                path: "/".to_string(),
                secure: true,
                http_only: false,
                expires: None,
                name: "log_session_id".to_string(),
                value: "abc123".to_string(),
            }
        );
        assert!(cookies[1].http_only);
        assert_eq!(cookies[1].domain, "school.example.com");
        assert_eq!(cookies[1].expires, Some(1924992000));
    }

    #[test]
    fn test_header() {
        let cookies = parse(FILE).unwrap();
        assert_eq!(cookies[0].header(), "log_session_id=abc123; Path=/; Domain=school.example.com; Secure");
        assert_eq!(cookies[1].header(), "canvas_session=xyz; Path=/; Secure; HttpOnly");
        assert_eq!(cookies[1].origin().unwrap().as_str(), "https://school.example.com/");
    }

    #[rstest]
    #[case("example.com\tTRUE\t/\tFALSE\t0\tname", 1)]
    #[case("# comment\nexample.com\tMAYBE\t/\tFALSE\t0\tname\tvalue", 2)]
    #[case("example.com\tTRUE\t/\tFALSE\tsoon\tname\tvalue", 1)]
    fn test_malformed(#[case] contents: &str, #[case] line: usize) {
        let err = parse(contents).unwrap_err();
        assert_eq!(*err, ErrorKind::Cookie(line));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("cookies.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CookieFile(_)));
    }

    #[tokio::test]
    async fn test_load_populates_jar() {
        use reqwest::cookie::CookieStore;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, FILE).unwrap();
        let jar = load(&path).await.unwrap();
        let url = Url::parse("https://school.example.com/api/v1/courses").unwrap();
        let header = jar.cookies(&url).unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("log_session_id=abc123"));
        assert!(header.contains("canvas_session=xyz"));
    }
}
