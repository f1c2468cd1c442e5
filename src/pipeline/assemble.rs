//! Markdown assembly: ordered elements → one Markdown document.
//!
//! Each element renders to one fragment followed by a blank line. Image
//! fragments need an upload first; uploads run up to
//! [`AssembleOptions::concurrency`] at a time through an *ordered* buffer,
//! so the document reads in element order no matter which upload finishes
//! first. A failed upload renders nothing (or the configured placeholder)
//! and never shifts the elements after it.

use super::tables::pad_ragged;
use super::{Element, ExtractedImage, PageElement, Table};
use crate::config::ConversionConfig;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};

/// Publishes an image and returns its URL, or `None` when it could not be
/// published.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, image: &ExtractedImage, page: usize) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Image uploads in flight at once.
    pub concurrency: usize,
    /// Line written in place of an image whose upload failed.
    pub placeholder: Option<String>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            placeholder: None,
        }
    }
}

impl From<&ConversionConfig> for AssembleOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            concurrency: config.image_upload_concurrency,
            placeholder: config.image_placeholder.clone(),
        }
    }
}

/// Render `elements` to Markdown, uploading images through `uploader`.
pub async fn assemble<S>(
    elements: S,
    uploader: &dyn ImageUploader,
    options: &AssembleOptions,
) -> String
where
    S: Stream<Item = PageElement>,
{
    elements
        .map(|pe| render_element(pe, uploader, options))
        .buffered(options.concurrency.max(1))
        .fold(String::new(), |mut doc, fragment| async move {
            doc.push_str(&fragment);
            doc
        })
        .await
}

async fn render_element(
    pe: PageElement,
    uploader: &dyn ImageUploader,
    options: &AssembleOptions,
) -> String {
    match pe.element {
        Element::Text(text) => format!("{text}\n\n"),
        Element::Table(table) => {
            let rendered = render_table(table);
            if rendered.is_empty() {
                rendered
            } else {
                format!("{rendered}\n\n")
            }
        }
        Element::Image(image) => match uploader.upload(&image, pe.page).await {
            Some(url) => format!("![Image]({url})\n\n"),
            None => options
                .placeholder
                .as_ref()
                .map(|line| format!("{line}\n\n"))
                .unwrap_or_default(),
        },
    }
}

/// Render a grid as a GFM pipe table; the first row is the header.
///
/// Ragged rows are padded, `|` is escaped and line breaks inside a cell
/// become spaces. An empty grid renders as an empty string.
pub fn render_table(mut table: Table) -> String {
    pad_ragged(&mut table);
    let width = table.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut lines = Vec::with_capacity(table.len() + 1);
    let mut rows = table.iter();
    if let Some(header) = rows.next() {
        lines.push(render_row(header));
    }
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(rows.map(|row| render_row(row)));
    lines.join("\n")
}

fn render_row(row: &[Option<String>]) -> String {
    let cells: Vec<String> = row
        .iter()
        .map(|cell| escape_cell(cell.as_deref().unwrap_or("")))
        .collect();
    format!("| {} |", cells.join(" | "))
}

fn escape_cell(cell: &str) -> String {
    cell.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Uploads succeed except for the named files; earlier images sleep
    /// longer so they finish last.
    struct SlowUploader {
        fail: HashSet<String>,
        seen: Mutex<Vec<String>>,
    }

    impl SlowUploader {
        fn new(fail: &[&str]) -> Self {
            Self {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageUploader for SlowUploader {
        async fn upload(&self, image: &ExtractedImage, page: usize) -> Option<String> {
            let delay = 40u64.saturating_sub(page as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.seen.lock().unwrap().push(image.file_name.clone());
            if self.fail.contains(&image.file_name) {
                None
            } else {
                Some(format!("https://cdn/{}", image.file_name))
            }
        }
    }

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn img(page: usize, index: usize) -> PageElement {
        PageElement::new(page, Element::Image(ExtractedImage::new(page, index, "png", vec![1])))
    }

    #[test]
    fn table_renders_header_separator_and_body() {
        let md = render_table(vec![
            vec![s("Name"), s("Score")],
            vec![s("Ada"), s("9")],
            vec![s("Bob"), None],
        ]);
        assert_eq!(
            md,
            "| Name | Score |\n| --- | --- |\n| Ada | 9 |\n| Bob |  |"
        );
    }

    #[test]
    fn table_escapes_pipes_and_pads_ragged_rows() {
        let md = render_table(vec![
            vec![s("a|b"), s("c")],
            vec![s("line\nbreak")],
        ]);
        assert_eq!(md, "| a\\|b | c |\n| --- | --- |\n| line break |  |");
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(render_table(Vec::new()), "");
        assert_eq!(render_table(vec![Vec::new()]), "");
    }

    #[tokio::test]
    async fn output_follows_element_order_not_upload_order() {
        let elements = vec![
            PageElement::new(1, Element::Text("Intro".into())),
            img(1, 1),
            img(2, 1),
            img(3, 1),
            PageElement::new(3, Element::Text("End".into())),
        ];
        let uploader = SlowUploader::new(&[]);
        let md = assemble(stream::iter(elements), &uploader, &AssembleOptions::default()).await;
        assert_eq!(
            md,
            "Intro\n\n![Image](https://cdn/image_1_1.png)\n\n![Image](https://cdn/image_2_1.png)\n\n![Image](https://cdn/image_3_1.png)\n\nEnd\n\n"
        );
        // Later images finished first.
        let seen = uploader.seen.lock().unwrap();
        assert_eq!(seen.first().map(String::as_str), Some("image_3_1.png"));
    }

    #[tokio::test]
    async fn failed_upload_is_omitted_without_reordering() {
        let elements = vec![img(1, 1), img(1, 2), PageElement::new(2, Element::Text("After".into()))];
        let uploader = SlowUploader::new(&["image_1_1.png"]);
        let md = assemble(stream::iter(elements), &uploader, &AssembleOptions::default()).await;
        assert_eq!(md, "![Image](https://cdn/image_1_2.png)\n\nAfter\n\n");
    }

    #[tokio::test]
    async fn failed_upload_uses_placeholder_when_configured() {
        let uploader = SlowUploader::new(&["image_1_1.png"]);
        let options = AssembleOptions {
            placeholder: Some("*[image unavailable]*".into()),
            ..Default::default()
        };
        let md = assemble(stream::iter(vec![img(1, 1)]), &uploader, &options).await;
        assert_eq!(md, "*[image unavailable]*\n\n");
    }

    #[tokio::test]
    async fn sequential_uploads_with_concurrency_one() {
        let uploader = SlowUploader::new(&[]);
        let options = AssembleOptions {
            concurrency: 1,
            placeholder: None,
        };
        let md = assemble(stream::iter(vec![img(1, 1), img(2, 1)]), &uploader, &options).await;
        assert!(md.find("image_1_1").unwrap() < md.find("image_2_1").unwrap());
        let seen = uploader.seen.lock().unwrap();
        assert_eq!(*seen, vec!["image_1_1.png".to_string(), "image_2_1.png".to_string()]);
    }
}
