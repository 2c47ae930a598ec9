//! EPUB metadata and cover extraction.
//!
//! Reads `META-INF/container.xml` to find the package document, then pulls
//! `dc:title`, `dc:creator` and a cover image out of the OPF.

use std::io::{Cursor, Read};

use base64::Engine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::capture::file_stem;
use crate::error::{Error, Result};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const UNKNOWN_AUTHOR: &str = "未知作者";

/// Metadata pulled from an EPUB file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpubInfo {
    pub title: String,
    pub author: String,
    /// Cover as a `data:<media-type>;base64,...` URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
    properties: String,
}

#[derive(Debug, Default)]
struct Package {
    title: Option<String>,
    creator: Option<String>,
    cover_id: Option<String>,
    manifest: Vec<ManifestItem>,
}

type Archive = zip::ZipArchive<Cursor<Vec<u8>>>;

/// Parse an EPUB. `file_name` supplies the title when the OPF has none.
///
/// # Errors
///
/// Returns [`Error::Epub`] if the bytes are not a zip, the container or
/// package document is missing, or the XML is malformed.
pub fn parse_epub(bytes: &[u8], file_name: &str) -> Result<EpubInfo> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::Epub(format!("not a zip archive: {e}")))?;

    let container = read_text(&mut archive, CONTAINER_PATH)?
        .ok_or_else(|| Error::Epub(format!("missing {CONTAINER_PATH}")))?;
    let rootfile = find_rootfile(&container)?
        .ok_or_else(|| Error::Epub("container.xml has no rootfile".to_string()))?;
    let root_dir = match rootfile.rfind('/') {
        Some(idx) => rootfile[..=idx].to_string(),
        None => String::new(),
    };

    let opf = read_text(&mut archive, &rootfile)?
        .ok_or_else(|| Error::Epub(format!("missing package document {rootfile}")))?;
    let package = parse_package(&opf)?;

    let title = package
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_stem(file_name));
    let author = package
        .creator
        .clone()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let cover = find_cover(&mut archive, &package, &root_dir)?;

    Ok(EpubInfo {
        title: title.trim().to_string(),
        author: author.trim().to_string(),
        cover,
    })
}

fn read_entry(archive: &mut Archive, path: &str) -> Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(path) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::Epub(format!("{path}: {e}"))),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(Some(buf))
}

fn read_text(archive: &mut Archive, path: &str) -> Result<Option<String>> {
    Ok(read_entry(archive, path)?.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Epub(format!("malformed XML: {e}"))
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(std::borrow::Cow::into_owned))
}

fn find_rootfile(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attr(&e, b"full-path") {
                    return Ok(Some(path));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Creator,
}

fn parse_package(xml: &str) -> Result<Package> {
    let mut reader = Reader::from_str(xml);
    let mut package = Package::default();
    let mut in_metadata = false;
    let mut capturing: Option<(Field, String)> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata && package.title.is_none() => {
                    capturing = Some((Field::Title, String::new()));
                }
                b"creator" if in_metadata && package.creator.is_none() => {
                    capturing = Some((Field::Creator, String::new()));
                }
                b"meta" => note_cover_meta(&e, &mut package),
                b"item" => package.manifest.push(manifest_item(&e)),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"meta" => note_cover_meta(&e, &mut package),
                b"item" => package.manifest.push(manifest_item(&e)),
                _ => {}
            },
            Event::Text(t) => {
                if let Some((_, buf)) = capturing.as_mut() {
                    buf.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(t) => {
                if let Some((_, buf)) = capturing.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = false,
                b"title" | b"creator" => match capturing.take() {
                    Some((Field::Title, text)) => package.title = Some(text),
                    Some((Field::Creator, text)) => package.creator = Some(text),
                    None => {}
                },
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(package)
}

fn note_cover_meta(e: &BytesStart<'_>, package: &mut Package) {
    if package.cover_id.is_none() && attr(e, b"name").as_deref() == Some("cover") {
        package.cover_id = attr(e, b"content");
    }
}

fn manifest_item(e: &BytesStart<'_>) -> ManifestItem {
    ManifestItem {
        id: attr(e, b"id").unwrap_or_default(),
        href: attr(e, b"href").unwrap_or_default(),
        media_type: attr(e, b"media-type").unwrap_or_default(),
        properties: attr(e, b"properties").unwrap_or_default(),
    }
}

/// Cover lookup order: `<meta name="cover">` → `cover-image` property →
/// first image whose href mentions "cover".
fn find_cover(archive: &mut Archive, package: &Package, root_dir: &str) -> Result<Option<String>> {
    if let Some(cover_id) = &package.cover_id {
        if let Some(item) = package.manifest.iter().find(|i| &i.id == cover_id) {
            if let Some(url) = load_cover(archive, item, root_dir)? {
                return Ok(Some(url));
            }
        }
    }

    if let Some(item) = package
        .manifest
        .iter()
        .find(|i| i.properties.split_whitespace().any(|p| p == "cover-image"))
    {
        if let Some(url) = load_cover(archive, item, root_dir)? {
            return Ok(Some(url));
        }
    }

    for item in package.manifest.iter().filter(|i| {
        i.media_type.starts_with("image") && i.href.to_lowercase().contains("cover")
    }) {
        if let Some(url) = load_cover(archive, item, root_dir)? {
            return Ok(Some(url));
        }
    }

    Ok(None)
}

fn load_cover(archive: &mut Archive, item: &ManifestItem, root_dir: &str) -> Result<Option<String>> {
    if item.href.is_empty() {
        return Ok(None);
    }
    let bytes = match read_entry(archive, &format!("{root_dir}{}", item.href))? {
        Some(b) => Some(b),
        None => read_entry(archive, &item.href)?,
    };
    Ok(bytes.map(|b| {
        let media_type = if item.media_type.is_empty() {
            "image/jpeg"
        } else {
            item.media_type.as_str()
        };
        format!(
            "data:{media_type};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b)
        )
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    pub(crate) fn build_epub(opf: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("mimetype", options).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        writer.start_file(CONTAINER_PATH, options).unwrap();
        writer
            .write_all(
                br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
            )
            .unwrap();
        writer.start_file("OEBPS/content.opf", options).unwrap();
        writer.write_all(opf.as_bytes()).unwrap();
        for (name, data) in extra {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub(crate) const SAMPLE_OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>The Rust Book</dc:title>
    <dc:creator>Ferris &amp; Friends</dc:creator>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="cover-img" href="images/front.png" media-type="image/png"/>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
</package>"#;

    #[test]
    fn test_parse_title_author_and_meta_cover() {
        let epub = build_epub(SAMPLE_OPF, &[("OEBPS/images/front.png", b"PNG")]);
        let info = parse_epub(&epub, "rust.epub").unwrap();
        assert_eq!(info.title, "The Rust Book");
        assert_eq!(info.author, "Ferris & Friends");
        assert_eq!(info.cover.as_deref(), Some("data:image/png;base64,UE5H"));
    }

    #[test]
    fn test_fallbacks_when_metadata_missing() {
        let opf = r#"<package><metadata></metadata><manifest>
            <item id="c" href="Cover.jpg" media-type="image/jpeg"/>
        </manifest></package>"#;
        let epub = build_epub(opf, &[("Cover.jpg", b"JPG")]);
        let info = parse_epub(&epub, "my-book.epub").unwrap();
        assert_eq!(info.title, "my-book");
        assert_eq!(info.author, "未知作者");
        assert!(info.cover.unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_cover_image_property() {
        let opf = r#"<package><metadata><dc:title xmlns:dc="x">T</dc:title></metadata><manifest>
            <item id="a" href="art.svg" media-type="image/svg+xml" properties="cover-image"/>
        </manifest></package>"#;
        let epub = build_epub(opf, &[("OEBPS/art.svg", b"<svg/>")]);
        let info = parse_epub(&epub, "t.epub").unwrap();
        assert!(info.cover.unwrap().starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_rejects_non_zip() {
        let err = parse_epub(b"plain text", "x.epub").unwrap_err();
        assert!(matches!(err, Error::Epub(_)));
    }

    #[test]
    fn test_rejects_missing_container() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"hi").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let err = parse_epub(&bytes, "x.epub").unwrap_err();
        assert!(err.to_string().contains("container.xml"));
    }
}
