//! Page enumeration and dimension probing.

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::ingest::scanner::work_key;
use crate::utils::natsort::NameCompare;

/// Image extensions recognized as pages, matched case-insensitively.
const IMAGE_EXTENSIONS: &[&str] = &[
    "avif", "bmp", "gif", "jpeg", "jpg", "png", "svg", "webp",
];

/// One scanned page. `path` is relative to the scan root with `/` separators;
/// dimensions are absent when probing failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEntry {
    pub path: String,
    pub page_index: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ratio: Option<f64>,
}

/// Enumerate the image files among `files` in natural order and probe each
/// one's dimensions. Index assignment comes purely from the sorted position.
/// A failed probe logs a warning and keeps the page with absent dimensions.
pub fn scan_pages(root: &Path, dir: &Path, files: &[String], compare: NameCompare) -> Vec<PageEntry> {
    let mut names: Vec<&String> = files.iter().filter(|name| is_image(name.as_str())).collect();
    names.sort_by(|a, b| compare(a.as_str(), b.as_str()));

    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let absolute = dir.join(name);
            let (width, height) = match image::image_dimensions(&absolute) {
                Ok((w, h)) => (Some(w), Some(h)),
                Err(e) => {
                    warn!("Failed to read image size {:?}: {}", absolute, e);
                    (None, None)
                }
            };

            let ratio = match (width, height) {
                (Some(w), Some(h)) if h > 0 => Some(f64::from(w) / f64::from(h)),
                _ => None,
            };

            PageEntry {
                path: work_key(root, &absolute),
                page_index: index as i64,
                width,
                height,
                ratio,
            }
        })
        .collect()
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::natsort::natural_cmp;
    use std::fs;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recognizes_image_extensions_case_insensitively() {
        assert!(is_image("cover.JPG"));
        assert!(is_image("page.webp"));
        assert!(is_image("drawing.svg"));
        assert!(!is_image("meta.json"));
        assert!(!is_image("noext"));
    }

    #[test]
    fn natural_order_assigns_indices() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("work");
        fs::create_dir(&dir).unwrap();

        let files = names(&["page10.jpg", "page1.jpg", "page9.jpg", "page2.jpg", "meta.json"]);
        let pages = scan_pages(root.path(), &dir, &files, natural_cmp);

        let ordered: Vec<(&str, i64)> = pages
            .iter()
            .map(|p| (p.path.as_str(), p.page_index))
            .collect();
        assert_eq!(
            ordered,
            vec![
                ("work/page1.jpg", 0),
                ("work/page2.jpg", 1),
                ("work/page9.jpg", 2),
                ("work/page10.jpg", 3),
            ]
        );
    }

    #[test]
    fn probes_dimensions_and_ratio() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("work");
        fs::create_dir(&dir).unwrap();
        image::RgbImage::new(10, 20)
            .save(dir.join("page1.png"))
            .unwrap();

        let pages = scan_pages(root.path(), &dir, &names(&["page1.png"]), natural_cmp);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].width, Some(10));
        assert_eq!(pages[0].height, Some(20));
        assert_eq!(pages[0].ratio, Some(0.5));
    }

    #[test]
    fn unreadable_image_keeps_the_page_without_dimensions() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("work");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("broken.jpg"), b"not an image").unwrap();

        let pages = scan_pages(root.path(), &dir, &names(&["broken.jpg"]), natural_cmp);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].width, None);
        assert_eq!(pages[0].height, None);
        assert_eq!(pages[0].ratio, None);
        assert_eq!(pages[0].page_index, 0);
    }
}
