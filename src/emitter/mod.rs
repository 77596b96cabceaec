//! RSS 2.0 output.

use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::app::{PagefeedError, Result};
use crate::domain::Feed;

pub const GENERATOR: &str = concat!("pagefeed ", env!("CARGO_PKG_VERSION"));

fn xml_error(e: impl std::fmt::Display) -> PagefeedError {
    PagefeedError::Xml(e.to_string())
}

/// Drop characters XML 1.0 cannot carry (C0 controls other than tab/LF/CR).
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    let text = sanitize(text);
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

/// Serialize `feed` as an RSS 2.0 document. Entries are written in their
/// current order.
pub fn render(feed: &Feed) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss)).map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_error)?;

    write_text_element(&mut writer, "title", &feed.title)?;
    write_text_element(&mut writer, "link", feed.url.as_str())?;
    write_text_element(&mut writer, "description", &feed.description)?;
    write_text_element(&mut writer, "pubDate", &feed.last_modified.to_rfc2822())?;
    write_text_element(&mut writer, "generator", GENERATOR)?;

    for entry in &feed.entries {
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(xml_error)?;
        write_text_element(&mut writer, "title", &entry.title)?;
        write_text_element(&mut writer, "link", entry.link_str())?;
        write_text_element(&mut writer, "description", &entry.content)?;
        if let Some(date) = entry.publish_date {
            write_text_element(&mut writer, "pubDate", &date.to_rfc2822())?;
        }
        write_text_element(&mut writer, "guid", entry.link_str())?;
        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_error)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    String::from_utf8(out).map_err(xml_error)
}

/// Render `feed` and write it to `path`, replacing any previous file.
pub fn write_feed(feed: &Feed, path: &Path) -> Result<()> {
    let xml = render(feed)?;
    if path.exists() {
        tracing::debug!("Overwriting {}", path.display());
    }
    std::fs::write(path, xml)?;
    tracing::debug!("Wrote {} entries to {}", feed.entries.len(), path.display());
    Ok(())
}
