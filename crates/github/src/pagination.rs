//! Page numbers from the `Link` response header of paged listings.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPagination {
    pub next_page: Option<u32>,
    pub last_page: Option<u32>,
}

impl LinkPagination {
    /// Reads the `next` and `last` relations; anything else is ignored.
    pub fn parse(header: &str) -> Self {
        header
            .split(',')
            .filter_map(relation)
            .fold(Self::default(), |mut links, (rel, page)| {
                match rel {
                    "next" => links.next_page = Some(page),
                    "last" => links.last_page = Some(page),
                    _ => {}
                }
                links
            })
    }
}

/// One `<url>; rel="name"` link as `(name, page)`.
fn relation(link: &str) -> Option<(&str, u32)> {
    let (target, params) = link.trim().split_once(';')?;
    let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
    let rel = params
        .split(';')
        .find_map(|param| param.trim().strip_prefix("rel="))?
        .trim_matches('"');

    let (_, query) = url.split_once('?')?;
    let page = query.split('&').find_map(|pair| match pair.split_once('=') {
        Some(("page", value)) => value.parse().ok(),
        _ => None,
    })?;
    Some((rel, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_and_last() {
        let header = r#"<https://api.github.com/users/octo/starred?per_page=100&page=2>; rel="next", <https://api.github.com/users/octo/starred?per_page=100&page=7>; rel="last""#;
        let links = LinkPagination::parse(header);
        assert_eq!(links.next_page, Some(2));
        assert_eq!(links.last_page, Some(7));
    }

    #[test]
    fn last_page_has_no_next() {
        let header = r#"<https://api.github.com/users/octo/starred?page=1&per_page=100>; rel="first", <https://api.github.com/users/octo/starred?page=6&per_page=100>; rel="prev""#;
        assert_eq!(LinkPagination::parse(header), LinkPagination::default());
    }

    #[test]
    fn per_page_is_not_page() {
        let header = r#"<http://localhost/users/octo/starred?per_page=3>; rel="next""#;
        assert_eq!(LinkPagination::parse(header), LinkPagination::default());
    }

    #[test]
    fn ignores_garbage() {
        assert_eq!(LinkPagination::parse(""), LinkPagination::default());
        assert_eq!(
            LinkPagination::parse("<no-query>; rel=\"next\""),
            LinkPagination::default()
        );
    }
}
