use std::sync::OnceLock;

use regex::Regex;

fn after_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">\s+").expect("static regex"))
}

fn before_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+<").expect("static regex"))
}

fn script_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script.*?</script>").expect("static regex"))
}

/// Drop whitespace runs that touch a tag boundary.
///
/// `<p>\n  Hello world \n</p>` becomes `<p>Hello world</p>`; whitespace inside
/// text runs is left alone.
pub fn minify(body: &str) -> String {
    let collapsed = after_tag().replace_all(body, ">");
    before_tag().replace_all(&collapsed, "<").into_owned()
}

/// Remove `<script>` blocks, which otherwise confuse lazy matches.
pub fn strip_junk(body: &str) -> String {
    script_block().replace_all(body, "").into_owned()
}

/// The normalization every fetched page goes through before matching.
pub fn clean(body: &str) -> String {
    strip_junk(&minify(body))
}
