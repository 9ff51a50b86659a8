use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";
/// Maximum decompressed bytes to read from the document part (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Paragraph texts of `word/document.xml`, in document order.
pub fn extract_docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| format!("corrupt docx archive: {error}"))?;
    let entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|error| format!("{DOCUMENT_PART} not readable: {error}"))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|error| format!("{DOCUMENT_PART} not readable: {error}"))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!("{DOCUMENT_PART} exceeds size limit"));
    }

    paragraphs_from_xml(&xml)
}

fn paragraphs_from_xml(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"p" => current = Some(String::new()),
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Empty(element)) => match element.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" => push_to(&mut current, "\t"),
                b"br" | b"cr" => push_to(&mut current, "\n"),
                _ => {}
            },
            Ok(Event::Text(text)) if in_text_run => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| format!("bad text in {DOCUMENT_PART}: {error}"))?;
                push_to(&mut current, &unescaped);
            }
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if let Some(paragraph) = current.take() {
                        paragraphs.push(paragraph);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(format!("malformed {DOCUMENT_PART}: {error}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

fn push_to(current: &mut Option<String>, text: &str) {
    if let Some(paragraph) = current {
        paragraph.push_str(text);
    }
}
