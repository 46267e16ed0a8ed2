use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use snafu::prelude::*;
use tracing::debug;

use super::{History, HistoryLoadError, Timestamp};
use super::history_store::{
    ContentOutsideRootSnafu, InvalidTimestampSnafu, MalformedXmlSnafu, MissingLastArchivizedSnafu,
    MissingNameSnafu, MissingVersionSnafu, RootElementCountSnafu, TruncatedDocumentSnafu,
};

const ROOT_ELEMENT: &str = "archive";
const DIRECTORY_ELEMENT: &str = "directory";
const VERSION_ATTRIBUTE: &str = "version";
const NAME_ATTRIBUTE: &str = "name";
const LAST_ARCHIVIZED_ATTRIBUTE: &str = "lastArchivized";
const FORMAT_VERSION: &str = "1";
const INDENT_WIDTH: usize = 4;

/// Parser state while walking the element tree.
#[derive(Debug, Default)]
struct Cursor {
    depth: usize,
    roots: usize,
    directories: usize,
}

impl TryFrom<&str> for History {
    type Error = HistoryLoadError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let mut reader = Reader::from_str(contents);
        reader.config_mut().trim_text(true);

        let mut history = History::new();
        let mut cursor = Cursor::default();

        loop {
            match reader.read_event().context(MalformedXmlSnafu)? {
                Event::Start(element) => {
                    visit_element(&element, &cursor, &mut history)?;
                    cursor.enter(&element);
                    cursor.depth += 1;
                }
                Event::Empty(element) => {
                    visit_element(&element, &cursor, &mut history)?;
                    cursor.enter(&element);
                }
                Event::End(_) => cursor.depth = cursor.depth.saturating_sub(1),
                Event::Text(text) if cursor.depth == 0 => {
                    ensure!(
                        text.iter().all(u8::is_ascii_whitespace),
                        ContentOutsideRootSnafu
                    );
                }
                Event::Eof => break,
                _ => {}
            }
        }

        ensure!(cursor.depth == 0, TruncatedDocumentSnafu);
        ensure!(
            cursor.roots == 1,
            RootElementCountSnafu {
                found: cursor.roots
            }
        );

        debug!("Parsed {} archive history entries", history.len());
        Ok(history)
    }
}

impl Cursor {
    fn enter(&mut self, element: &BytesStart<'_>) {
        match self.depth {
            0 => self.roots += 1,
            1 if element.name().as_ref() == DIRECTORY_ELEMENT.as_bytes() => self.directories += 1,
            _ => {}
        }
    }
}

/// Validates `element` against its position before the cursor moves into it.
fn visit_element(
    element: &BytesStart<'_>,
    cursor: &Cursor,
    history: &mut History,
) -> Result<(), HistoryLoadError> {
    match cursor.depth {
        0 => {
            ensure!(
                cursor.roots == 0,
                RootElementCountSnafu {
                    found: cursor.roots + 1
                }
            );
            attribute(element, VERSION_ATTRIBUTE)?.context(MissingVersionSnafu)?;
        }
        1 if element.name().as_ref() == DIRECTORY_ELEMENT.as_bytes() => {
            let (directory, archived_at) = parse_directory(element, cursor.directories + 1)?;
            history.record(directory, archived_at);
        }
        _ => {}
    }
    Ok(())
}

fn parse_directory(
    element: &BytesStart<'_>,
    position: usize,
) -> Result<(String, Timestamp), HistoryLoadError> {
    let directory = attribute(element, NAME_ATTRIBUTE)?.context(MissingNameSnafu { position })?;
    let value = attribute(element, LAST_ARCHIVIZED_ATTRIBUTE)?.context(
        MissingLastArchivizedSnafu {
            directory: directory.clone(),
        },
    )?;
    let archived_at = value
        .parse::<Timestamp>()
        .context(InvalidTimestampSnafu { value })?;
    Ok((directory, archived_at))
}

/// Unescaped value of `name`; an empty value counts as absent.
fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, HistoryLoadError> {
    let Some(attribute) = element
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)
        .context(MalformedXmlSnafu)?
    else {
        return Ok(None);
    };
    let value = attribute
        .unescape_value()
        .map_err(quick_xml::Error::from)
        .context(MalformedXmlSnafu)?;
    Ok(Some(value.into_owned()).filter(|value| !value.is_empty()))
}

impl History {
    /// Renders the whole history as an `archive-history.xml` document.
    pub fn to_xml(&self) -> Result<Vec<u8>, quick_xml::Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
        write(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))),
        )?;

        let mut root = BytesStart::new(ROOT_ELEMENT);
        root.push_attribute((VERSION_ATTRIBUTE, FORMAT_VERSION));
        write(&mut writer, Event::Start(root))?;

        for (directory, archived_at) in self.iter() {
            let archived_at = archived_at.to_string();
            let mut element = BytesStart::new(DIRECTORY_ELEMENT);
            element.push_attribute((NAME_ATTRIBUTE, directory));
            element.push_attribute((LAST_ARCHIVIZED_ATTRIBUTE, archived_at.as_str()));
            write(&mut writer, Event::Empty(element))?;
        }

        write(&mut writer, Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), quick_xml::Error> {
    writer.write_event(event).map_err(quick_xml::Error::from)
}
