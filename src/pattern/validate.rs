use crate::app::{PagefeedError, Result};
use crate::pattern::{count, Placeholder};

/// The pattern-related parts of one target, as configured.
#[derive(Debug, Clone, Copy)]
pub struct PatternSet<'a> {
    pub url_count: usize,
    pub index: &'a [String],
    pub content: &'a [String],
    pub index_filters: &'a [String],
    pub content_filters: &'a [String],
    pub pubdate_formats: &'a [String],
}

fn invalid(msg: String) -> PagefeedError {
    PagefeedError::Pattern(msg)
}

fn check_arity(name: &str, len: usize, url_count: usize, optional: bool) -> Result<()> {
    if len == 0 && optional {
        return Ok(());
    }
    if len != 1 && len != url_count {
        return Err(invalid(format!(
            "{} count must be 1 or match the {} URLs, got {}",
            name, url_count, len
        )));
    }
    Ok(())
}

fn check_filters(name: &str, filters: &[String], main_len: usize) -> Result<()> {
    if filters.is_empty() {
        return Ok(());
    }
    if filters.len() != main_len {
        return Err(invalid(format!(
            "{} count must be 0 or {}, got {}",
            name,
            main_len,
            filters.len()
        )));
    }
    for filter in filters.iter().filter(|f| !f.trim().is_empty()) {
        if count(filter, Placeholder::Filter) < 1 {
            return Err(invalid(format!(
                "{} {:?} must contain at least one {}",
                name,
                filter,
                Placeholder::Filter.token()
            )));
        }
    }
    Ok(())
}

/// Check placeholder cardinality and pattern-to-URL arity for one target.
pub fn validate(set: &PatternSet<'_>) -> Result<()> {
    if set.url_count == 0 {
        return Err(invalid("target has no URLs".into()));
    }
    if set.index.is_empty() || set.content.is_empty() {
        return Err(invalid("index and content patterns are required".into()));
    }

    check_arity("index pattern", set.index.len(), set.url_count, false)?;
    check_arity("content pattern", set.content.len(), set.url_count, false)?;
    check_arity("index filter pattern", set.index_filters.len(), set.url_count, true)?;
    check_arity("content filter pattern", set.content_filters.len(), set.url_count, true)?;
    check_arity("pubdate format", set.pubdate_formats.len(), set.url_count, true)?;

    for pattern in set.index {
        if pattern.is_empty() {
            return Err(invalid("index pattern is empty".into()));
        }
        if count(pattern, Placeholder::Title) != 1 || count(pattern, Placeholder::Link) != 1 {
            return Err(invalid(format!(
                "index pattern {:?} must contain exactly one {} and one {}",
                pattern,
                Placeholder::Title.token(),
                Placeholder::Link.token()
            )));
        }
    }

    for pattern in set.content {
        if pattern.is_empty() {
            return Err(invalid("content pattern is empty".into()));
        }
        if count(pattern, Placeholder::Description) != 1 {
            return Err(invalid(format!(
                "content pattern {:?} must contain exactly one {}",
                pattern,
                Placeholder::Description.token()
            )));
        }
        if count(pattern, Placeholder::Title) > 0 || count(pattern, Placeholder::Link) > 0 {
            return Err(invalid(format!(
                "content pattern {:?} must not contain {} or {}",
                pattern,
                Placeholder::Title.token(),
                Placeholder::Link.token()
            )));
        }
    }

    check_filters("index filter pattern", set.index_filters, set.index.len())?;
    check_filters("content filter pattern", set.content_filters, set.content.len())?;

    let pubdates = |patterns: &[String]| -> Vec<usize> {
        patterns.iter().map(|p| count(p, Placeholder::PubDate)).collect()
    };
    let in_index = pubdates(set.index);
    let in_content = pubdates(set.content);
    let repeated = in_index.iter().chain(&in_content).any(|&n| n > 1);
    let both_sides = in_index.iter().any(|&n| n > 0) && in_content.iter().any(|&n| n > 0);
    if repeated || both_sides {
        return Err(invalid(format!(
            "{} may appear in the index or the content patterns of a target, not both, and \
             at most once per pattern",
            Placeholder::PubDate.token()
        )));
    }

    Ok(())
}

pub fn is_valid(set: &PatternSet<'_>) -> bool {
    match validate(set) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("{}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        urls: usize,
        index: Vec<String>,
        content: Vec<String>,
        index_filters: Vec<String>,
        content_filters: Vec<String>,
        pubdate_formats: Vec<String>,
    }

    impl Fixture {
        fn new(index: &str, content: &str) -> Self {
            Self {
                urls: 1,
                index: vec![index.into()],
                content: vec![content.into()],
                index_filters: vec![],
                content_filters: vec![],
                pubdate_formats: vec![],
            }
        }

        fn set(&self) -> PatternSet<'_> {
            PatternSet {
                url_count: self.urls,
                index: &self.index,
                content: &self.content,
                index_filters: &self.index_filters,
                content_filters: &self.content_filters,
                pubdate_formats: &self.pubdate_formats,
            }
        }

        fn valid(&self) -> bool {
            validate(&self.set()).is_ok()
        }
    }

    const INDEX: &str = r#"<a href="{link}">{title}</a>"#;
    const CONTENT: &str = "<article>{description}</article>";

    #[test]
    fn test_minimal_target_is_valid() {
        assert!(Fixture::new(INDEX, CONTENT).valid());
        assert!(is_valid(&Fixture::new(INDEX, CONTENT).set()));
    }

    #[test]
    fn test_index_title_and_link_cardinality() {
        assert!(!Fixture::new(r#"<a href="{link}"></a>"#, CONTENT).valid());
        assert!(!Fixture::new("<b>{title}</b>", CONTENT).valid());
        assert!(!Fixture::new("{title}{title}{link}", CONTENT).valid());
        assert!(!Fixture::new("{title}{link}{link}", CONTENT).valid());
        assert!(!Fixture::new("", CONTENT).valid());
    }

    #[test]
    fn test_content_rules() {
        assert!(!Fixture::new(INDEX, "<article></article>").valid());
        assert!(!Fixture::new(INDEX, "{description}{description}").valid());
        assert!(!Fixture::new(INDEX, "<h1>{title}</h1>{description}").valid());
        assert!(!Fixture::new(INDEX, "<a href=\"{link}\"></a>{description}").valid());
        assert!(!Fixture::new(INDEX, "").valid());
    }

    #[test]
    fn test_pubdate_once_per_target() {
        let with_index_date = r#"<a href="{link}">{title}</a><span>{pubdate}</span>"#;
        assert!(Fixture::new(with_index_date, CONTENT).valid());
        assert!(Fixture::new(INDEX, "<time>{pubdate}</time>{description}").valid());

        assert!(!Fixture::new(with_index_date, "<time>{pubdate}</time>{description}").valid());
        assert!(!Fixture::new("{title}{link}{pubdate}{pubdate}", CONTENT).valid());
        assert!(!Fixture::new(INDEX, "{pubdate}{description}{pubdate}").valid());

        // paired patterns: index #1 and content #2 both carry a date
        let mut f = Fixture::new(with_index_date, CONTENT);
        f.urls = 2;
        f.index = vec![with_index_date.into(), INDEX.into()];
        f.content = vec![CONTENT.into(), "<time>{pubdate}</time>{description}".into()];
        assert!(!f.valid());

        // dated index patterns on every URL are fine
        f.index = vec![with_index_date.into(), with_index_date.into()];
        f.content = vec![CONTENT.into(), CONTENT.into()];
        assert!(f.valid());
    }

    #[test]
    fn test_pubdate_format_arity() {
        let mut f = Fixture::new(INDEX, CONTENT);
        f.urls = 3;
        f.pubdate_formats = vec!["%Y-%m-%d".into()];
        assert!(f.valid());

        f.pubdate_formats = vec!["%Y".into(), "%Y".into(), "%Y".into()];
        assert!(f.valid());

        f.pubdate_formats = vec!["%Y".into(), "%Y".into()];
        assert!(!f.valid());
    }

    #[test]
    fn test_pattern_url_arity() {
        let mut f = Fixture::new(INDEX, CONTENT);
        f.urls = 2;
        assert!(f.valid());

        f.index = vec![INDEX.into(), INDEX.into()];
        assert!(f.valid());

        f.urls = 3;
        assert!(!f.valid());
    }

    #[test]
    fn test_filter_rules() {
        let mut f = Fixture::new(INDEX, CONTENT);
        f.index_filters = vec![r#"<ul id="list">{filter}</ul>"#.into()];
        assert!(f.valid());

        f.index_filters = vec!["".into()];
        assert!(f.valid());

        f.index_filters = vec!["<ul></ul>".into()];
        assert!(!f.valid());

        f.index_filters = vec!["{filter}".into(), "{filter}".into()];
        assert!(!f.valid());

        let mut f = Fixture::new(INDEX, CONTENT);
        f.content_filters = vec!["<main>{filter}</main>".into()];
        assert!(f.valid());
        f.content_filters = vec!["<main></main>".into()];
        assert!(!f.valid());
    }
}
