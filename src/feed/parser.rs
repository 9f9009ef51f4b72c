use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Errors for documents that are not a usable RSS channel.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document has no root element")]
    NoRootElement,
    #[error("document ended inside <{0}>")]
    Truncated(String),
}

/// A parsed RSS channel.
///
/// Built fresh for every fetch and never persisted; the scraper only reads it
/// to report what the feed currently contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    /// Items in document order.
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Kept verbatim; publication dates are not interpreted.
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    Language,
    PubDate,
}

/// Where an element sits relative to `<rss><channel>`.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Channel,
    Item,
    ChannelText(Field),
    ItemText(Field),
    Other,
}

/// Classify the innermost element of `path`.
///
/// Names are matched including any namespace prefix, so `<atom:link>` or
/// `<dc:title>` never overwrite the plain RSS fields.
fn slot(path: &[Vec<u8>]) -> Slot {
    match path {
        [_, channel] if channel.as_slice() == b"channel" => Slot::Channel,
        [_, channel, item] if channel.as_slice() == b"channel" && item.as_slice() == b"item" => {
            Slot::Item
        }
        [_, channel, name] if channel.as_slice() == b"channel" => match name.as_slice() {
            b"title" => Slot::ChannelText(Field::Title),
            b"link" => Slot::ChannelText(Field::Link),
            b"description" => Slot::ChannelText(Field::Description),
            b"language" => Slot::ChannelText(Field::Language),
            _ => Slot::Other,
        },
        [_, channel, item, name]
            if channel.as_slice() == b"channel" && item.as_slice() == b"item" =>
        {
            match name.as_slice() {
                b"title" => Slot::ItemText(Field::Title),
                b"link" => Slot::ItemText(Field::Link),
                b"description" => Slot::ItemText(Field::Description),
                b"pubDate" => Slot::ItemText(Field::PubDate),
                _ => Slot::Other,
            }
        }
        _ => Slot::Other,
    }
}

#[derive(Default)]
struct Builder {
    doc: FeedDocument,
    saw_root: bool,
    item: Option<FeedItem>,
    /// Text being collected and the depth of the element that owns it.
    text: Option<(usize, String)>,
}

impl Builder {
    fn open(&mut self, path: &[Vec<u8>]) {
        self.saw_root = true;
        match slot(path) {
            Slot::Item => self.item = Some(FeedItem::default()),
            Slot::ChannelText(_) | Slot::ItemText(_) => {
                self.text = Some((path.len(), String::new()));
            }
            Slot::Channel | Slot::Other => {}
        }
    }

    fn close(&mut self, path: &[Vec<u8>]) {
        match slot(path) {
            Slot::Item => {
                if let Some(item) = self.item.take() {
                    self.doc.items.push(item);
                }
            }
            Slot::ChannelText(field) => {
                if let Some((_, value)) = self.text.take() {
                    match field {
                        Field::Title => self.doc.title = value,
                        Field::Link => self.doc.link = value,
                        Field::Description => self.doc.description = value,
                        Field::Language => self.doc.language = value,
                        Field::PubDate => {}
                    }
                }
            }
            Slot::ItemText(field) => {
                if let (Some((_, value)), Some(item)) = (self.text.take(), self.item.as_mut()) {
                    match field {
                        Field::Title => item.title = value,
                        Field::Link => item.link = value,
                        Field::Description => item.description = value,
                        Field::PubDate => item.pub_date = value,
                        Field::Language => {}
                    }
                }
            }
            Slot::Channel | Slot::Other => {}
        }
    }

    /// Append character data if it belongs directly to the field being read.
    /// Text of markup nested inside a field is dropped.
    fn push_text(&mut self, depth: usize, chunk: &str) {
        if let Some((owner, text)) = self.text.as_mut() {
            if *owner == depth {
                text.push_str(chunk);
            }
        }
    }
}

/// Parse an RSS 2.0 document.
///
/// Only `<channel>` directly under the root element is read. Unknown elements
/// and attributes are ignored and missing text fields become empty strings.
/// Field text is kept as written, surrounding whitespace included.
///
/// Any well-formed document is accepted: one whose root has no `<channel>`
/// (an Atom `<feed>`, say) yields an empty document. Malformed XML and a body
/// without a root element are errors.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut builder = Builder::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                path.push(e.name().as_ref().to_vec());
                builder.open(&path);
            }
            Event::Empty(e) => {
                path.push(e.name().as_ref().to_vec());
                builder.open(&path);
                builder.close(&path);
                path.pop();
            }
            Event::End(_) => {
                builder.close(&path);
                path.pop();
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(quick_xml::Error::from)?;
                builder.push_text(path.len(), &text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e);
                builder.push_text(path.len(), &text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = path.last() {
        return Err(ParseError::Truncated(
            String::from_utf8_lossy(open).into_owned(),
        ));
    }
    if !builder.saw_root {
        return Err(ParseError::NoRootElement);
    }

    Ok(builder.doc)
}
