//! `Link` header parsing (RFC 8288), just enough to find `rel="next"`.

use url::Url;

/// Find the target of the `rel="next"` link in a `Link` header value.
///
/// Relative targets are resolved against `base` (the URL of the response).
/// Unparseable entries are skipped rather than failing the whole header.
///
/// ```
/// use mirror_remote::transport::parse_next_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/api/v1/courses").unwrap();
/// let header = r#"<https://example.com/api/v1/courses?page=1>; rel="current", <https://example.com/api/v1/courses?page=2>; rel="next""#;
/// assert_eq!(
///     parse_next_link(header, &base).unwrap().as_str(),
///     "https://example.com/api/v1/courses?page=2",
/// );
/// ```
pub fn parse_next_link(header: &str, base: &Url) -> Option<Url> {
    split_links(header).into_iter().find_map(|link| {
        let (target, params) = link.trim().strip_prefix('<')?.split_once('>')?;
        let is_next = params.split(';').filter_map(|param| param.split_once('=')).any(|(key, value)| {
            key.trim().eq_ignore_ascii_case("rel")
                && value.trim().trim_matches('"').split_ascii_whitespace().any(|rel| rel.eq_ignore_ascii_case("next"))
        });
        match is_next {
            true => base.join(target.trim()).ok(),
            false => None,
        }
    })
}

/// Split on commas that are not inside `<...>`; pagination bookmarks are
/// free to contain commas.
fn split_links(header: &str) -> Vec<&str> {
    let mut links = Vec::new();
    let mut in_target = false;
    let mut start = 0;
    for (index, ch) in header.char_indices() {
        match ch {
            '<' => in_target = true,
            '>' => in_target = false,
            ',' if !in_target => {
                links.push(&header[start..index]);
                start = index + 1;
            },
            _ => {},
        }
    }
    links.push(&header[start..]);
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base() -> Url {
        Url::parse("https://example.com/api/v1/folders/5/files?per_page=100").unwrap()
    }

    #[test]
    fn test_canvas_style_header() {
        let header = concat!(
            r#"<https://example.com/api/v1/folders/5/files?page=1&per_page=100>; rel="current","#,
            r#"<https://example.com/api/v1/folders/5/files?page=2&per_page=100>; rel="next","#,
            r#"<https://example.com/api/v1/folders/5/files?page=1&per_page=100>; rel="first","#,
            r#"<https://example.com/api/v1/folders/5/files?page=3&per_page=100>; rel="last""#,
        );
        let next = parse_next_link(header, &base()).unwrap();
        assert_eq!(next.as_str(), "https://example.com/api/v1/folders/5/files?page=2&per_page=100");
    }

    #[test]
    fn test_last_page_has_no_next() {
        let header = r#"<https://example.com/a?page=3>; rel="current", <https://example.com/a?page=1>; rel="first""#;
        assert_eq!(parse_next_link(header, &base()), None);
    }

    #[test]
    fn test_commas_inside_target() {
        let header = r#"<https://example.com/a?page=bookmark:WyJhIiwxXQ,,>; rel="next""#;
        let next = parse_next_link(header, &base()).unwrap();
        assert_eq!(next.query(), Some("page=bookmark:WyJhIiwxXQ,,"));
    }

    #[rstest]
    #[case(r#"</api/v1/x?page=2>; rel="next""#, "https://example.com/api/v1/x?page=2")]
    #[case(r#"<https://other.example/y>; REL=next"#, "https://other.example/y")]
    #[case(r#"<https://example.com/z>; title="x"; rel="prev next""#, "https://example.com/z")]
    fn test_variants(#[case] header: &str, #[case] expected: &str) {
        assert_eq!(parse_next_link(header, &base()).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("garbage")]
    #[case(r#"https://example.com/no-brackets; rel="next""#)]
    fn test_malformed(#[case] header: &str) {
        assert_eq!(parse_next_link(header, &base()), None);
    }
}
