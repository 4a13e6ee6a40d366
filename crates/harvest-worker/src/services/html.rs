// HTML handling: CSS-selector exclusion rules, Markdown-lite conversion and
// link extraction.
//
// Extraction rules are pure exclusions: every node matching a rule selector
// is dropped before conversion. The conversion itself is intentionally
// small; it preserves headings, paragraphs, lists, links and code blocks.

use std::collections::HashSet;

use harvest_contracts::entry::ExtractedLink;
use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node, Selector};
use tracing::warn;
use url::Url;

/// Convert an HTML document to Markdown, dropping nodes matched by the
/// exclusion selectors.
pub fn html_to_markdown(html: &str, exclusion_selectors: &[String]) -> String {
    let document = Html::parse_document(html);
    let excluded = excluded_nodes(&document, exclusion_selectors);

    let mut out = String::new();
    render(*document.root_element(), &excluded, &mut out, 0);
    collapse_blank_lines(&out)
}

/// The page title, from `<title>`.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

/// Unique absolute links from the document body, in document order.
pub fn extract_links(html: &str, base: Option<&Url>) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let resolved = match (Url::parse(href), base) {
            (Ok(url), _) => url,
            (Err(_), Some(base)) => match base.join(href) {
                Ok(url) => url,
                Err(_) => continue,
            },
            (Err(_), None) => continue,
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            let title = anchor.text().collect::<String>().trim().to_string();
            links.push(ExtractedLink { url, title });
        }
    }
    links
}

fn excluded_nodes(document: &Html, selectors: &[String]) -> HashSet<NodeId> {
    let mut excluded = HashSet::new();
    for raw in selectors {
        match Selector::parse(raw) {
            Ok(selector) => {
                for element in document.select(&selector) {
                    excluded.insert(element.id());
                }
            }
            Err(_) => warn!(selector = %raw, "skipping invalid extraction rule"),
        }
    }
    excluded
}

fn render(
    node: NodeRef<'_, Node>,
    excluded: &HashSet<NodeId>,
    out: &mut String,
    list_depth: usize,
) {
    if excluded.contains(&node.id()) {
        return;
    }
    match node.value() {
        Node::Text(text) => {
            let text = text.trim_matches(|c: char| c == '\n' || c == '\r');
            if !text.trim().is_empty() {
                out.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" "));
                out.push(' ');
            }
        }
        Node::Element(element) => {
            let name = element.name();
            match name {
                "script" | "style" | "noscript" | "head" | "iframe" | "svg" => return,
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    out.push_str("\n\n");
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    render_children(node, excluded, out, list_depth);
                    out.push_str("\n\n");
                    return;
                }
                "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "aside"
                | "blockquote" | "table" | "tr" => {
                    out.push_str("\n\n");
                    render_children(node, excluded, out, list_depth);
                    out.push_str("\n\n");
                    return;
                }
                "br" => {
                    out.push('\n');
                    return;
                }
                "li" => {
                    out.push('\n');
                    out.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                    out.push_str("- ");
                    render_children(node, excluded, out, list_depth);
                    return;
                }
                "ul" | "ol" => {
                    out.push('\n');
                    render_children(node, excluded, out, list_depth + 1);
                    out.push('\n');
                    return;
                }
                "pre" => {
                    out.push_str("\n\n```\n");
                    let mut code = String::new();
                    collect_text(node, &mut code);
                    out.push_str(code.trim_end());
                    out.push_str("\n```\n\n");
                    return;
                }
                "code" => {
                    let mut code = String::new();
                    collect_text(node, &mut code);
                    out.push('`');
                    out.push_str(code.trim());
                    out.push_str("` ");
                    return;
                }
                "a" => {
                    let mut text = String::new();
                    collect_text(node, &mut text);
                    let text = text.trim();
                    match element.attr("href") {
                        Some(href) if !text.is_empty() => {
                            out.push_str(&format!("[{text}]({href}) "));
                        }
                        _ => {
                            out.push_str(text);
                            out.push(' ');
                        }
                    }
                    return;
                }
                "strong" | "b" => {
                    let mut text = String::new();
                    collect_text(node, &mut text);
                    if !text.trim().is_empty() {
                        out.push_str(&format!("**{}** ", text.trim()));
                    }
                    return;
                }
                "em" | "i" => {
                    let mut text = String::new();
                    collect_text(node, &mut text);
                    if !text.trim().is_empty() {
                        out.push_str(&format!("*{}* ", text.trim()));
                    }
                    return;
                }
                "img" => return,
                _ => {}
            }
            render_children(node, excluded, out, list_depth);
        }
        _ => render_children(node, excluded, out, list_depth),
    }
}

fn render_children(
    node: NodeRef<'_, Node>,
    excluded: &HashSet<NodeId>,
    out: &mut String,
    list_depth: usize,
) {
    for child in node.children() {
        render(child, excluded, out, list_depth);
    }
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&text),
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            lines.push("");
        } else {
            blank_run = 0;
            lines.push(line);
        }
    }
    lines.join("\n").trim().to_string()
}

/// Number lines 1-based for the distillation prompt.
pub fn number_lines(markdown: &str) -> String {
    markdown
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Slice a 1-based inclusive line range out of Markdown content. Out-of-range
/// bounds are clamped; an inverted range yields the full content.
pub fn slice_lines(markdown: &str, start_line: u32, end_line: u32) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = start_line.max(1) as usize - 1;
    let end = (end_line as usize).min(lines.len());
    if start >= lines.len() || end == 0 || start >= end {
        return markdown.to_string();
    }
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Sample Page</title></head><body>
        <nav class="menu"><a href="/home">Home</a></nav>
        <article>
          <h1>Heading</h1>
          <p>First <strong>bold</strong> paragraph with a
             <a href="https://example.com/doc">link</a>.</p>
          <ul><li>one</li><li>two</li></ul>
          <pre>let x = 1;</pre>
        </article>
        <footer>Copyright</footer>
        </body></html>
    "#;

    #[test]
    fn converts_headings_lists_and_code() {
        let markdown = html_to_markdown(PAGE, &[]);
        assert!(markdown.contains("# Heading"));
        assert!(markdown.contains("- one"));
        assert!(markdown.contains("- two"));
        assert!(markdown.contains("```\nlet x = 1;\n```"));
        assert!(markdown.contains("[link](https://example.com/doc)"));
        assert!(markdown.contains("**bold**"));
    }

    #[test]
    fn exclusion_rules_drop_matching_subtrees() {
        let markdown = html_to_markdown(PAGE, &["nav.menu".to_string(), "footer".to_string()]);
        assert!(!markdown.contains("Home"));
        assert!(!markdown.contains("Copyright"));
        assert!(markdown.contains("# Heading"));
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let markdown = html_to_markdown(PAGE, &["[[[".to_string()]);
        assert!(markdown.contains("# Heading"));
    }

    #[test]
    fn title_extraction() {
        assert_eq!(page_title(PAGE).as_deref(), Some("Sample Page"));
        assert_eq!(page_title("<p>no title</p>"), None);
    }

    #[test]
    fn link_extraction_resolves_and_dedupes() {
        let base = Url::parse("https://site.test/article").unwrap();
        let html = r#"
            <a href="https://example.com/a">A</a>
            <a href="/relative">Rel</a>
            <a href="https://example.com/a">A again</a>
            <a href="mailto:x@example.com">mail</a>
        "#;
        let links = extract_links(html, Some(&base));
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://site.test/relative"]);
        assert_eq!(links[0].title, "A");
    }

    #[test]
    fn line_numbering_and_slicing() {
        let markdown = "alpha\nbeta\ngamma\ndelta";
        let numbered = number_lines(markdown);
        assert!(numbered.starts_with("1: alpha"));
        assert!(numbered.contains("4: delta"));

        assert_eq!(slice_lines(markdown, 2, 3), "beta\ngamma");
        // Clamped at both ends.
        assert_eq!(slice_lines(markdown, 0, 99), markdown);
        // Inverted range falls back to the whole content.
        assert_eq!(slice_lines(markdown, 3, 2), markdown);
    }
}
