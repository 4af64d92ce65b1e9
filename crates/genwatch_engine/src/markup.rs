use genwatch_core::PreviewDigest;
use scraper::{Html, Selector};

const TRUNCATED_MARKER: &str = "\n.[truncated]";

/// Reduces rendered portfolio markup to a title and a markdown body.
///
/// The body comes from `<main>` if present, otherwise `<body>`, otherwise the
/// whole document. The title is `<title>`, falling back to the first `<h1>`.
pub fn digest_markup(portfolio_id: &str, html: &str, max_chars: usize) -> PreviewDigest {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, "title").or_else(|| first_text(&doc, "h1"));
    let content_html = ["main", "body"]
        .iter()
        .find_map(|tag| first_inner_html(&doc, tag))
        .unwrap_or_else(|| doc.root_element().html());
    let markdown = html2md::parse_html(&content_html);

    PreviewDigest {
        portfolio_id: portfolio_id.to_string(),
        title,
        body: truncate(markdown.trim(), max_chars),
    }
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn first_inner_html(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next().map(|node| node.inner_html())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATED_MARKER}", &text[..end])
}
