//! Bulk chapter import from an EPUB file. Chapters are taken in spine order
//! and appended after the novel's last chapter.

use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use eyre::WrapErr;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use serde::Serialize;
use zip::{ZipArchive, result::ZipError};

use crate::{
    App,
    error::{ApiRequestError, AppError},
    identity::AdminUser,
    novel::models::NewChapter,
    schema::chapters,
};

use super::{MAX_TITLE_CHARS, chapters::touch_novel, find_novel};

pub const MAX_EPUB_BYTES: usize = 20 * 1024 * 1024;
const MAX_ENTRY_BYTES: u64 = 5 * 1024 * 1024;
const MAX_CHAPTERS: usize = 2000;

const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(thiserror::Error, Debug)]
pub enum EpubError {
    #[error("The file is not a readable EPUB archive.")]
    Archive(#[from] ZipError),

    #[error("The EPUB is missing `{0}`.")]
    MissingEntry(String),

    #[error("`{0}` in the EPUB is too large.")]
    EntryTooLarge(String),

    #[error("`{0}` in the EPUB is not valid UTF-8.")]
    NotUtf8(String),

    #[error("`{entry}` in the EPUB is not well-formed: {reason}")]
    Malformed { entry: String, reason: String },

    #[error("The EPUB container does not point to a package document.")]
    NoPackage,

    #[error("The EPUB contains no readable chapters.")]
    NoChapters,

    #[error("The EPUB has more than {} chapters.", MAX_CHAPTERS)]
    TooManyChapters,
}

impl ApiRequestError for EpubError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

#[derive(Debug, PartialEq)]
pub struct ImportedChapter {
    /// First heading of the document, or its `<title>`
    pub title: Option<String>,
    /// Paragraphs separated by blank lines
    pub content: String,
}

/// Manifest items by id, and the spine as manifest ids in reading order.
#[derive(Debug, Default, PartialEq)]
struct Package {
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<String>,
}

#[derive(Debug, PartialEq)]
struct ManifestItem {
    href: String,
    media_type: String,
}

impl ManifestItem {
    fn is_document(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "application/xhtml+xml" | "text/html"
        )
    }
}

/// Reads every linear spine document with some text in it, in order.
pub fn read_epub(bytes: &[u8]) -> Result<Vec<ImportedChapter>, EpubError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let container = read_entry(&mut archive, CONTAINER_PATH)?;
    let package_path = package_path(&container)?.ok_or(EpubError::NoPackage)?;

    let opf = read_entry(&mut archive, &package_path)?;
    let package = parse_package(&package_path, &opf)?;

    let mut imported = vec![];
    for idref in &package.spine {
        let Some(item) = package.manifest.get(idref) else {
            tracing::debug!(%idref, "Spine item missing from manifest, skipping");
            continue;
        };
        if !item.is_document() {
            continue;
        }

        let path = resolve_href(&package_path, &item.href);
        let xhtml = read_entry(&mut archive, &path)?;
        let chapter = extract_chapter(&path, &xhtml)?;

        if chapter.content.is_empty() {
            tracing::debug!(%path, "Spine document has no text, skipping");
            continue;
        }

        imported.push(chapter);
        if imported.len() > MAX_CHAPTERS {
            return Err(EpubError::TooManyChapters);
        }
    }

    if imported.is_empty() {
        return Err(EpubError::NoChapters);
    }

    Ok(imported)
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, EpubError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(EpubError::MissingEntry(name.into())),
        Err(e) => return Err(e.into()),
    };

    let mut buf = vec![];
    entry
        .take(MAX_ENTRY_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(ZipError::from)?;

    if buf.len() as u64 > MAX_ENTRY_BYTES {
        return Err(EpubError::EntryTooLarge(name.into()));
    }

    String::from_utf8(buf).map_err(|_| EpubError::NotUtf8(name.into()))
}

fn malformed(entry: &str, e: quick_xml::Error) -> EpubError {
    EpubError::Malformed {
        entry: entry.into(),
        reason: e.to_string(),
    }
}

fn attribute(element: &BytesStart, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// The `full-path` of the first rootfile in `container.xml`.
fn package_path(container: &str) -> Result<Option<String>, EpubError> {
    let mut reader = Reader::from_str(container);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, "full-path") {
                    return Ok(Some(path));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(malformed(CONTAINER_PATH, e)),
            _ => {}
        }
    }
}

fn parse_package(path: &str, opf: &str) -> Result<Package, EpubError> {
    let mut reader = Reader::from_str(opf);
    let mut package = Package::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    let (Some(id), Some(href)) = (attribute(&e, "id"), attribute(&e, "href"))
                    else {
                        continue;
                    };
                    let media_type = attribute(&e, "media-type").unwrap_or_default();
                    package.manifest.insert(id, ManifestItem { href, media_type });
                }
                b"itemref" => {
                    if attribute(&e, "linear").as_deref() == Some("no") {
                        continue;
                    }
                    if let Some(idref) = attribute(&e, "idref") {
                        package.spine.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(path, e)),
            _ => {}
        }
    }

    Ok(package)
}

/// Resolves a manifest href against the directory of the package document.
fn resolve_href(package_path: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();

    let mut parts: Vec<&str> = package_path.split('/').collect();
    parts.pop();

    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            segment => parts.push(segment),
        }
    }

    parts.join("/")
}

fn is_block(name: &[u8]) -> bool {
    const BLOCKS: [&[u8]; 14] = [
        b"p", b"div", b"br", b"li", b"blockquote", b"section", b"article", b"h1", b"h2", b"h3",
        b"h4", b"h5", b"h6", b"hr",
    ];
    BLOCKS.iter().any(|b| name.eq_ignore_ascii_case(b))
}

fn is_heading(name: &[u8]) -> bool {
    [b"h1", b"h2", b"h3"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(*h))
}

/// HTML entities that XHTML chapters commonly carry but XML doesn't define.
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some(" "),
        "mdash" => Some("\u{2014}"),
        "ndash" => Some("\u{2013}"),
        "hellip" => Some("\u{2026}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pulls the readable text out of one XHTML document. The first h1-h3
/// becomes the title and is left out of the content.
fn extract_chapter(path: &str, xhtml: &str) -> Result<ImportedChapter, EpubError> {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().check_end_names = false;

    let mut paragraphs: Vec<String> = vec![];
    let mut current = String::new();
    let mut head_title = String::new();
    let mut heading: Option<String> = None;

    let mut in_body = false;
    let mut in_head_title = false;
    let mut in_heading = false;
    let mut skip_depth = 0usize;

    let flush = |current: &mut String, paragraphs: &mut Vec<String>| {
        let text = collapse_whitespace(current);
        if !text.is_empty() {
            paragraphs.push(text);
        }
        current.clear();
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name.eq_ignore_ascii_case(b"body") {
                    in_body = true;
                } else if name.eq_ignore_ascii_case(b"title") && !in_body {
                    in_head_title = true;
                } else if name.eq_ignore_ascii_case(b"script") || name.eq_ignore_ascii_case(b"style")
                {
                    skip_depth += 1;
                } else if in_body && is_block(name) {
                    flush(&mut current, &mut paragraphs);
                    in_heading = is_heading(name) && heading.is_none();
                }
            }
            Ok(Event::Empty(e)) => {
                if in_body && is_block(e.local_name().as_ref()) {
                    flush(&mut current, &mut paragraphs);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name.eq_ignore_ascii_case(b"body") {
                    in_body = false;
                } else if name.eq_ignore_ascii_case(b"title") {
                    in_head_title = false;
                } else if name.eq_ignore_ascii_case(b"script") || name.eq_ignore_ascii_case(b"style")
                {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if in_heading && is_heading(name) {
                    in_heading = false;
                    let text = collapse_whitespace(&current);
                    current.clear();
                    if !text.is_empty() {
                        heading = Some(text);
                    }
                } else if in_body && is_block(name) {
                    flush(&mut current, &mut paragraphs);
                }
            }
            Ok(Event::Text(e)) if skip_depth == 0 => {
                let text = match e.unescape_with(html_entity) {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                if in_body {
                    current.push_str(&text);
                } else if in_head_title {
                    head_title.push_str(&text);
                }
            }
            Ok(Event::CData(e)) if in_body && skip_depth == 0 => {
                current.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(path, e)),
            _ => {}
        }
    }
    flush(&mut current, &mut paragraphs);

    let head_title = collapse_whitespace(&head_title);
    let title = heading.or((!head_title.is_empty()).then_some(head_title));

    Ok(ImportedChapter {
        title,
        content: paragraphs.join("\n\n"),
    })
}

/// Numbers chapters from `first_number`. Untitled chapters are named after
/// their number and long titles are cut to fit.
fn number_chapters(
    novel_id: i32,
    first_number: i32,
    imported: Vec<ImportedChapter>,
) -> Vec<NewChapter> {
    imported
        .into_iter()
        .zip(first_number..)
        .map(|(chapter, number)| NewChapter {
            novel_id,
            number,
            title: chapter
                .title
                .map(|t| t.chars().take(MAX_TITLE_CHARS).collect())
                .unwrap_or_else(|| format!("Chapter {number}")),
            content: chapter.content,
        })
        .collect()
}

#[derive(Serialize, Debug)]
pub struct ImportSummary {
    imported: usize,
    first_number: i32,
    last_number: i32,
}

pub async fn import_epub(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    AdminUser(admin): AdminUser,
    body: Bytes,
) -> Result<(StatusCode, Json<ImportSummary>), AppError> {
    let imported = tokio::task::spawn_blocking(move || read_epub(&body))
        .await
        .wrap_err("EPUB parsing task failed")??;

    let mut conn = ctx.diesel.get().await?;

    let novel = find_novel(&mut conn, &slug).await?;
    let novel_id = novel.id;

    let summary = conn
        .transaction::<ImportSummary, diesel::result::Error, _>(|conn| {
            async move {
                let last = chapters::table
                    .filter(chapters::novel_id.eq(novel_id))
                    .select(diesel::dsl::max(chapters::number))
                    .first::<Option<i32>>(conn)
                    .await?;

                let first_number = last.unwrap_or(0) + 1;
                let rows = number_chapters(novel_id, first_number, imported);

                let inserted = diesel::insert_into(chapters::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;

                touch_novel(conn, novel_id).await?;

                Ok(ImportSummary {
                    imported: inserted,
                    first_number,
                    last_number: first_number + inserted as i32 - 1,
                })
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        novel_id,
        imported = summary.imported,
        first_number = summary.first_number,
        admin = admin.id,
        "Chapters imported from EPUB"
    );

    Ok((StatusCode::CREATED, Json(summary)))
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    // Spine order differs from manifest order on purpose
    const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata/>
  <manifest>
    <item id="c2" href="text/two.xhtml" media-type="application/xhtml+xml"/>
    <item id="c1" href="text/one.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="cover" linear="no"/>
    <itemref idref="c1"/>
    <itemref idref="css"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

    const CHAPTER_ONE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Ignored head title</title><style>p { margin: 0 }</style></head>
<body>
  <h1>The   Harbor</h1>
  <p>The tide came in <em>slowly</em> that night.</p>
  <p>Nobody &amp; nothing moved.</p>
</body>
</html>"#;

    const CHAPTER_TWO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Low Water</title></head>
<body><div>First line<br/>second line</div></body>
</html>"#;

    fn epub(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn sample_epub() -> Vec<u8> {
        epub(&[
            ("mimetype", "application/epub+zip"),
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", PACKAGE),
            ("OEBPS/cover.xhtml", "<html><body><p>Cover</p></body></html>"),
            ("OEBPS/text/one.xhtml", CHAPTER_ONE),
            ("OEBPS/text/two.xhtml", CHAPTER_TWO),
            ("OEBPS/style.css", "p {}"),
        ])
    }

    #[test]
    fn test_read_epub_follows_spine_order() {
        let chapters = read_epub(&sample_epub()).unwrap();

        assert_eq!(
            chapters,
            vec![
                ImportedChapter {
                    title: Some("The Harbor".into()),
                    content: "The tide came in slowly that night.\n\nNobody & nothing moved."
                        .into(),
                },
                ImportedChapter {
                    title: Some("Low Water".into()),
                    content: "First line\n\nsecond line".into(),
                },
            ]
        );
    }

    #[test]
    fn test_read_epub_rejects_broken_archives() {
        assert!(matches!(
            read_epub(b"definitely not a zip"),
            Err(EpubError::Archive(_))
        ));

        let no_container = epub(&[("mimetype", "application/epub+zip")]);
        assert!(matches!(
            read_epub(&no_container),
            Err(EpubError::MissingEntry(name)) if name == CONTAINER_PATH
        ));

        let missing_chapter = epub(&[
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", PACKAGE),
            ("OEBPS/text/one.xhtml", CHAPTER_ONE),
        ]);
        assert!(matches!(
            read_epub(&missing_chapter),
            Err(EpubError::MissingEntry(name)) if name == "OEBPS/text/two.xhtml"
        ));
    }

    #[test]
    fn test_read_epub_without_text_has_no_chapters() {
        let empty = epub(&[
            (CONTAINER_PATH, CONTAINER),
            (
                "OEBPS/content.opf",
                r#"<package><manifest><item id="a" href="a.xhtml" media-type="application/xhtml+xml"/></manifest><spine><itemref idref="a"/></spine></package>"#,
            ),
            ("OEBPS/a.xhtml", "<html><body><img src=\"x.png\"/></body></html>"),
        ]);
        assert!(matches!(read_epub(&empty), Err(EpubError::NoChapters)));

        let no_rootfile = epub(&[(CONTAINER_PATH, "<container><rootfiles/></container>")]);
        assert!(matches!(read_epub(&no_rootfile), Err(EpubError::NoPackage)));
    }

    #[test]
    fn test_epub_errors_are_unprocessable() {
        let err: AppError = EpubError::NoChapters.into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS/content.opf", "text/one.xhtml"), "OEBPS/text/one.xhtml");
        assert_eq!(resolve_href("content.opf", "one.xhtml#start"), "one.xhtml");
        assert_eq!(resolve_href("a/b/content.opf", "../c/./d.xhtml"), "a/c/d.xhtml");
    }

    #[test]
    fn test_extract_chapter_falls_back_to_head_title() {
        let chapter = extract_chapter(
            "x.xhtml",
            "<html><head><title> Prologue </title></head><body><p>Once&nbsp;upon</p><script>var a = 1;</script></body></html>",
        )
        .unwrap();

        assert_eq!(chapter.title.as_deref(), Some("Prologue"));
        assert_eq!(chapter.content, "Once upon");
    }

    #[test]
    fn test_number_chapters_appends_after_last() {
        let imported = vec![
            ImportedChapter {
                title: None,
                content: "a".into(),
            },
            ImportedChapter {
                title: Some("x".repeat(MAX_TITLE_CHARS + 20)),
                content: "b".into(),
            },
        ];

        let rows = number_chapters(9, 4, imported);

        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].novel_id, rows[0].number), (9, 4));
        assert_eq!(rows[0].title, "Chapter 4");
        assert_eq!(rows[1].number, 5);
        assert_eq!(rows[1].title.chars().count(), MAX_TITLE_CHARS);
    }
}
