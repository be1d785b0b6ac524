//! Receipt rendering to SVG and PNG.
//!
//! Layout:
//! - Fixed-width white card on a light grey background
//! - Monospace text, label on the left and value right-aligned
//! - Dashed rules between sections
//! - Values too long for one row wrap below their label
//!
//! PNG output rasterizes the same SVG with resvg. System fonts are loaded
//! once per process.

use std::sync::{Arc, LazyLock};

use receipt_core::Receipt;
use resvg::usvg::{self, fontdb};

/// Card width in pixels.
const WIDTH: u32 = 480;

/// Inner padding of the card.
const PADDING: u32 = 28;

/// Characters that fit on one row at [`FONT_SIZE`].
const COLUMNS: usize = 48;

/// Body font size.
const FONT_SIZE: u32 = 14;

/// Height of one body row.
const LINE_HEIGHT: u32 = 20;

/// Wrapped values are cut after this many rows.
const MAX_WRAPPED_ROWS: usize = 6;

const FONT_FAMILY: &str = "Courier New, Courier, DejaVu Sans Mono, monospace";

static FONTS: LazyLock<Arc<fontdb::Database>> = LazyLock::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "font database loaded");
    Arc::new(db)
});

/// One printed row of the card.
#[derive(Debug, Clone, PartialEq)]
enum Row {
    /// Centered text.
    Center { text: String, size: u32, bold: bool },
    /// Label left, value right.
    Pair { label: String, value: String },
    /// Left-aligned continuation text.
    Text(String),
    /// Dashed separator.
    Rule,
}

impl Row {
    fn center(text: impl Into<String>, size: u32, bold: bool) -> Self {
        Self::Center {
            text: text.into(),
            size,
            bold,
        }
    }

    fn height(&self) -> u32 {
        match self {
            Self::Center { size, .. } => size + 10,
            Self::Pair { .. } | Self::Text(_) => LINE_HEIGHT,
            Self::Rule => 18,
        }
    }
}

/// Break `text` into rows of at most `width` characters, on word boundaries
/// where possible.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        // Hard-split words that cannot fit on any row.
        while word.len() > width {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            rows.push(word.drain(..width).collect());
        }

        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

fn layout(receipt: &Receipt) -> Vec<Row> {
    let mut rows = vec![
        Row::center(receipt.title, 22, true),
        Row::center(&receipt.date, 12, false),
        Row::center(format!("ORDER #{}", receipt.order_number), 12, false),
    ];

    for section in &receipt.sections {
        rows.push(Row::Rule);
        if let Some(heading) = section.heading {
            rows.push(Row::center(heading, FONT_SIZE, true));
        }

        for line in &section.lines {
            let fits = line.label.chars().count() + 1 + line.value.chars().count() <= COLUMNS;
            if fits {
                rows.push(Row::Pair {
                    label: line.label.to_string(),
                    value: line.value.clone(),
                });
                continue;
            }

            rows.push(Row::Pair {
                label: line.label.to_string(),
                value: String::new(),
            });
            let mut wrapped = wrap(&line.value, COLUMNS);
            if wrapped.len() > MAX_WRAPPED_ROWS {
                wrapped.truncate(MAX_WRAPPED_ROWS);
                if let Some(last) = wrapped.last_mut() {
                    let keep: String = last.chars().take(COLUMNS - 3).collect();
                    *last = format!("{keep}...");
                }
            }
            rows.extend(wrapped.into_iter().map(Row::Text));
        }
    }

    rows.push(Row::Rule);
    rows.push(Row::center(receipt.footer, 16, true));
    let url: String = receipt.url.chars().take(COLUMNS + 8).collect();
    rows.push(Row::center(url, 11, false));
    rows
}

/// Escape text for use inside SVG elements and attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Canvas height for `rows`.
fn height_of(rows: &[Row]) -> u32 {
    PADDING * 2 + rows.iter().map(Row::height).sum::<u32>()
}

/// Render `receipt` as a standalone SVG document.
pub fn render_svg(receipt: &Receipt) -> String {
    let rows = layout(receipt);
    let height = height_of(&rows);
    let left = PADDING;
    let right = WIDTH - PADDING;
    let center = WIDTH / 2;

    let mut svg = String::with_capacity(4096);
    svg.push_str(&format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}"><rect width="{WIDTH}" height="{height}" fill="#eee"/><rect x="8" y="8" width="{w}" height="{h}" fill="#fff"/><g font-family="{FONT_FAMILY}" font-size="{FONT_SIZE}" fill="#111">"##,
        w = WIDTH - 16,
        h = height - 16,
    ));

    let mut y = PADDING;
    for row in &rows {
        let h = row.height();
        let baseline = y + h - 6;
        match row {
            Row::Center { text, size, bold } => {
                let weight = if *bold { "700" } else { "400" };
                svg.push_str(&format!(
                    r#"<text x="{center}" y="{baseline}" text-anchor="middle" font-size="{size}" font-weight="{weight}">{}</text>"#,
                    escape(text)
                ));
            }
            Row::Pair { label, value } => {
                svg.push_str(&format!(
                    r#"<text x="{left}" y="{baseline}" font-weight="700">{}</text>"#,
                    escape(label)
                ));
                if !value.is_empty() {
                    svg.push_str(&format!(
                        r#"<text x="{right}" y="{baseline}" text-anchor="end">{}</text>"#,
                        escape(value)
                    ));
                }
            }
            Row::Text(text) => {
                svg.push_str(&format!(
                    r#"<text x="{left}" y="{baseline}">{}</text>"#,
                    escape(text)
                ));
            }
            Row::Rule => {
                let mid = y + h / 2;
                svg.push_str(&format!(
                    r##"<line x1="{left}" y1="{mid}" x2="{right}" y2="{mid}" stroke="#111" stroke-width="1" stroke-dasharray="4 3"/>"##
                ));
            }
        }
        y += h;
    }

    svg.push_str("</g></svg>");
    svg
}

/// Render `receipt` as a PNG image.
pub fn render_png(receipt: &Receipt) -> anyhow::Result<Vec<u8>> {
    let svg = render_svg(receipt);

    let options = usvg::Options {
        fontdb: Arc::clone(&FONTS),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(&svg, &options)
        .map_err(|e| anyhow::anyhow!("SVG parse error: {e}"))?;

    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("failed to create pixmap"))?;

    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| anyhow::anyhow!("PNG encode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use receipt_core::{GithubUser, Profile, XUser};

    fn issued_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn github_receipt() -> Receipt {
        let user = GithubUser {
            login: "octocat".to_string(),
            html_url: "https://github.com/octocat".to_string(),
            public_repos: 8,
            followers: 12_345,
            created_at: "2011-01-25T18:44:36Z".to_string(),
            ..Default::default()
        };
        Receipt::from_profile(&Profile::Github(user), issued_at())
    }

    fn x_receipt(bio: &str) -> Receipt {
        let user = XUser {
            id: "1".to_string(),
            name: "Alice".to_string(),
            username: "alice".to_string(),
            description: Some(bio.to_string()),
            ..Default::default()
        };
        Receipt::from_profile(&Profile::X(user), issued_at())
    }

    #[test]
    fn wrap_respects_width() {
        let rows = wrap("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(rows, vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]);
        assert!(rows.iter().all(|r| r.chars().count() <= 10));
    }

    #[test]
    fn wrap_splits_long_words() {
        let rows = wrap("abcdefghijkl xy", 5);
        assert_eq!(rows, vec!["abcde", "fghij", "kl xy"]);
    }

    #[test]
    fn escape_markup() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &apos;Jerry&apos;&lt;/b&gt;"
        );
    }

    #[test]
    fn svg_contains_receipt_text() {
        let svg = render_svg(&github_receipt());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("GITHUB RECEIPT"));
        assert!(svg.contains("12,345"));
        assert!(svg.contains("THANK YOU FOR CODING!"));
    }

    #[test]
    fn long_values_wrap_and_grow_canvas() {
        let short = layout(&x_receipt("hi"));
        let long = layout(&x_receipt(&"word ".repeat(200)));
        assert!(height_of(&long) > height_of(&short));
        assert!(long.iter().any(|r| matches!(r, Row::Text(t) if t.ends_with("..."))));
    }

    #[test]
    fn png_has_signature() {
        let png = render_png(&x_receipt("<script>alert(1)</script>")).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }
}
