// Minimal RSS/Atom item extraction.
//
// Feed parsing is a leaf of the pipeline: this extracts the handful of
// fields ingestion needs (title, link, author, timestamp, content) from
// either format without modeling the rest of the specs.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub author: String,
    pub published: Option<String>,
    pub content_html: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<ParsedItem>,
}

fn item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<(item|entry)[\s>].*?</(item|entry)\s*>").unwrap())
}

pub fn parse_feed(xml: &str) -> ParsedFeed {
    let mut feed = ParsedFeed {
        title: first_tag(pre_items(xml), "title").unwrap_or_default(),
        items: Vec::new(),
    };

    for capture in item_regex().find_iter(xml) {
        let block = capture.as_str();
        let link = atom_link(block)
            .or_else(|| first_tag(block, "link"))
            .unwrap_or_default();
        let content_html = first_tag(block, "content:encoded")
            .or_else(|| first_tag(block, "content"))
            .or_else(|| first_tag(block, "description"))
            .or_else(|| first_tag(block, "summary"))
            .unwrap_or_default();
        feed.items.push(ParsedItem {
            title: first_tag(block, "title").unwrap_or_default(),
            link,
            author: author_of(block),
            published: first_tag(block, "pubDate")
                .or_else(|| first_tag(block, "published"))
                .or_else(|| first_tag(block, "updated"))
                .or_else(|| first_tag(block, "dc:date")),
            content_html,
        });
    }
    feed
}

/// The channel/feed header, before the first item.
fn pre_items(xml: &str) -> &str {
    match item_regex().find(xml) {
        Some(m) => &xml[..m.start()],
        None => xml,
    }
}

fn first_tag(block: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?s)<{0}(?:\s[^>]*)?>(.*?)</{0}>", regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    let inner = re.captures(block)?.get(1)?.as_str();
    let text = strip_cdata(inner).trim().to_string();
    (!text.is_empty()).then(|| decode_entities(&text))
}

/// Atom link elements carry the URL in an href attribute.
fn atom_link(block: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"<link[^>]*?href\s*=\s*["']([^"']+)["'][^>]*/?>"#).unwrap()
    });
    // Prefer rel="alternate" or un-rel'd links over self/edit links.
    for capture in re.captures_iter(block) {
        let whole = capture.get(0).map(|m| m.as_str()).unwrap_or("");
        if whole.contains("rel=") && !whole.contains("alternate") {
            continue;
        }
        return Some(decode_entities(capture.get(1)?.as_str()));
    }
    None
}

fn author_of(block: &str) -> String {
    if let Some(author_block) = first_raw_tag(block, "author") {
        if let Some(name) = first_tag(&author_block, "name") {
            return name;
        }
        let text = strip_cdata(&author_block).trim().to_string();
        if !text.contains('<') && !text.is_empty() {
            return decode_entities(&text);
        }
    }
    first_tag(block, "dc:creator").unwrap_or_default()
}

fn first_raw_tag(block: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?s)<{0}(?:\s[^>]*)?>(.*?)</{0}>", regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    Some(re.captures(block)?.get(1)?.as_str().to_string())
}

fn strip_cdata(text: &str) -> String {
    text.trim()
        .strip_prefix("<![CDATA[")
        .and_then(|t| t.strip_suffix("]]>"))
        .unwrap_or(text)
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel>
        <title>Example Blog</title>
        <item>
            <title>First &amp; foremost</title>
            <link>https://blog.test/posts/1</link>
            <pubDate>Mon, 06 Jan 2026 10:00:00 GMT</pubDate>
            <dc:creator>Ann Author</dc:creator>
            <description><![CDATA[<p>Hello world</p>]]></description>
        </item>
        <item>
            <title>Second</title>
            <link>https://blog.test/posts/2</link>
            <content:encoded><![CDATA[<p>Body two</p>]]></content:encoded>
        </item>
        </channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
        <title>Atom Feed</title>
        <link rel="self" href="https://atom.test/feed.xml"/>
        <entry>
            <title>Atom Post</title>
            <link rel="alternate" href="https://atom.test/posts/a"/>
            <author><name>Bob</name></author>
            <published>2026-01-06T10:00:00Z</published>
            <content type="html">&lt;p&gt;Atom body&lt;/p&gt;</content>
        </entry>
        </feed>"#;

    #[test]
    fn parses_rss_items() {
        let feed = parse_feed(RSS);
        assert_eq!(feed.title, "Example Blog");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "First & foremost");
        assert_eq!(first.link, "https://blog.test/posts/1");
        assert_eq!(first.author, "Ann Author");
        assert_eq!(first.published.as_deref(), Some("Mon, 06 Jan 2026 10:00:00 GMT"));
        assert_eq!(first.content_html, "<p>Hello world</p>");

        assert_eq!(feed.items[1].content_html, "<p>Body two</p>");
    }

    #[test]
    fn parses_atom_entries() {
        let feed = parse_feed(ATOM);
        assert_eq!(feed.title, "Atom Feed");
        assert_eq!(feed.items.len(), 1);

        let entry = &feed.items[0];
        assert_eq!(entry.title, "Atom Post");
        assert_eq!(entry.link, "https://atom.test/posts/a");
        assert_eq!(entry.author, "Bob");
        assert_eq!(entry.content_html, "<p>Atom body</p>");
    }

    #[test]
    fn empty_document_yields_no_items() {
        let feed = parse_feed("<rss><channel><title>Empty</title></channel></rss>");
        assert!(feed.items.is_empty());
        assert_eq!(feed.title, "Empty");
    }
}
