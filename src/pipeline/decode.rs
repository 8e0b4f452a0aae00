//! Scene decoding: raw page bytes → canonical [`SceneDocument`].
//!
//! A page is a v6 scene stream: a fixed ASCII header followed by
//! length-prefixed blocks. Only two block kinds carry content we care about —
//! typed-text blocks and stroke (line item) blocks — everything else is
//! skipped by length. Decoding normalises both into the [`SceneBlock`]
//! tagged union once, up front, so no consumer ever has to sniff where
//! stroke points live.
//!
//! ## Failure policy
//!
//! [`decode`] never errors to the caller. Any structural problem (bad magic,
//! truncated block, invalid UTF-8) yields an empty document: one corrupt page
//! must never abort a batch. The recovered error is logged at debug level.

use tracing::debug;

/// Detection threshold: a page "has strokes" when any stroke block carries
/// at least this many points. Deliberately distinct from
/// [`crate::pipeline::raster::STROKE_RENDER_MIN_POINTS`] (a stroke needs two
/// points to be drawable); do not unify the two.
pub const STROKE_DETECT_MIN_POINTS: usize = 1;

/// Header of a v6 scene stream, space-padded to [`HEADER_LEN`] bytes.
const HEADER_MAGIC: &[u8] = b"reMarkable .lines file, version=6";
const HEADER_LEN: usize = 43;

/// Block type carrying a stroke wrapped in a scene-item envelope.
const BLOCK_LINE_ITEM: u8 = 0x05;
/// Block type carrying the page's typed text.
const BLOCK_ROOT_TEXT: u8 = 0x07;

/// Item envelope value tag for a line payload.
const VALUE_LINE: u8 = 0x03;

/// Item envelope flags.
const ITEM_HAS_VALUE: u8 = 0x01;
const ITEM_DELETED: u8 = 0x02;

/// One point of a pen gesture, in source (center-origin X) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One continuous pen gesture: an ordered point sequence plus brush
/// attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    /// Palette index; resolved to a colour by the rasterizer.
    pub color: u32,
    /// Brush thickness scale; rounded to a pen width by the rasterizer.
    pub thickness: f64,
}

/// One decoded content block, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneBlock {
    TypedText { text: String },
    Stroke(Stroke),
}

/// Decoded in-memory content of one note page.
///
/// Owned exclusively by one page's pipeline run and discarded after use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDocument {
    pub blocks: Vec<SceneBlock>,
}

impl SceneDocument {
    /// Typed text of the page: ordered `TypedText` blocks joined with
    /// newlines, or `None` when the page has no typed text.
    pub fn typed_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .blocks
            .iter()
            .filter_map(|b| match b {
                SceneBlock::TypedText { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Whether the page contains any handwriting at all.
    ///
    /// This is the *detection* threshold (≥ 1 point): it answers "does this
    /// page need recognition", not "can this stroke be drawn".
    pub fn has_strokes(&self) -> bool {
        self.strokes()
            .any(|s| s.points.len() >= STROKE_DETECT_MIN_POINTS)
    }

    /// All stroke blocks, in document order.
    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.blocks.iter().filter_map(|b| match b {
            SceneBlock::Stroke(s) => Some(s),
            _ => None,
        })
    }
}

/// Parse raw page bytes into a [`SceneDocument`].
///
/// Malformed input yields an empty document, never an error.
pub fn decode(bytes: &[u8]) -> SceneDocument {
    match parse(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Scene decode failed ({e}); treating page as empty");
            SceneDocument::default()
        }
    }
}

/// Internal parse error. Never escapes [`decode`].
#[derive(Debug)]
enum ParseError {
    BadHeader,
    Truncated(&'static str),
    BadText,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::BadHeader => write!(f, "bad header"),
            ParseError::Truncated(what) => write!(f, "truncated {what}"),
            ParseError::BadText => write!(f, "invalid UTF-8 in text block"),
        }
    }
}

/// Little-endian cursor over a byte slice. Every read is bounds-checked so
/// the parser can bail out cleanly on truncated input.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::Truncated(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, ParseError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ParseError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, ParseError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self, what: &'static str) -> Result<f32, ParseError> {
        let b = self.take(4, what)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self, what: &'static str) -> Result<f64, ParseError> {
        let b = self.take(8, what)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(f64::from_le_bytes(arr))
    }
}

fn parse(bytes: &[u8]) -> Result<SceneDocument, ParseError> {
    let mut r = Reader::new(bytes);

    let header = r.take(HEADER_LEN, "header")?;
    if !header.starts_with(HEADER_MAGIC) {
        return Err(ParseError::BadHeader);
    }

    let mut blocks = Vec::new();
    while r.remaining() > 0 {
        let payload_len = r.u32("block length")? as usize;
        let _unknown = r.u8("block meta")?;
        let _min_version = r.u8("block meta")?;
        let _current_version = r.u8("block meta")?;
        let block_type = r.u8("block type")?;
        let payload = r.take(payload_len, "block payload")?;

        match block_type {
            BLOCK_LINE_ITEM => {
                if let Some(stroke) = parse_line_item(payload)? {
                    blocks.push(SceneBlock::Stroke(stroke));
                }
            }
            BLOCK_ROOT_TEXT => {
                let text = parse_root_text(payload)?;
                blocks.push(SceneBlock::TypedText { text });
            }
            // Migration info, author ids, page info, …: no page content.
            _ => {}
        }
    }

    Ok(SceneDocument { blocks })
}

/// Parse a scene line item block. Returns `None` for deleted items and
/// items without a line value (tombstones are part of the format).
fn parse_line_item(payload: &[u8]) -> Result<Option<Stroke>, ParseError> {
    let mut r = Reader::new(payload);
    let _item_id = r.u32("item id")?;
    let flags = r.u8("item flags")?;

    if flags & ITEM_DELETED != 0 || flags & ITEM_HAS_VALUE == 0 {
        return Ok(None);
    }

    let value_type = r.u8("item value type")?;
    if value_type != VALUE_LINE {
        return Ok(None);
    }

    let _tool = r.u32("line tool")?;
    let color = r.u32("line color")?;
    let thickness = r.f64("line thickness")?;
    let point_count = r.u32("point count")? as usize;

    let mut points = Vec::with_capacity(point_count.min(4096));
    for _ in 0..point_count {
        let x = r.f32("point x")?;
        let y = r.f32("point y")?;
        let _speed = r.u16("point speed")?;
        let _width = r.u16("point width")?;
        let _direction = r.u8("point direction")?;
        let _pressure = r.u8("point pressure")?;
        points.push(Point { x, y });
    }
    // Trailing payload bytes are newer optional fields; ignore them.

    Ok(Some(Stroke {
        points,
        color,
        thickness,
    }))
}

/// Parse a root text block: formatting spans concatenate into one string.
fn parse_root_text(payload: &[u8]) -> Result<String, ParseError> {
    let mut r = Reader::new(payload);
    let span_count = r.u32("text span count")? as usize;

    let mut text = String::new();
    for _ in 0..span_count {
        let len = r.u32("text span length")? as usize;
        let raw = r.take(len, "text span")?;
        let span = std::str::from_utf8(raw).map_err(|_| ParseError::BadText)?;
        text.push_str(span);
    }
    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::testenc::*;
    use super::*;

    #[test]
    fn empty_stream_is_empty_document() {
        let doc = decode(&header());
        assert!(doc.blocks.is_empty());
        assert!(doc.typed_text().is_none());
        assert!(!doc.has_strokes());
    }

    #[test]
    fn bad_magic_recovers_to_empty() {
        let doc = decode(b"definitely not a scene stream");
        assert_eq!(doc, SceneDocument::default());
    }

    #[test]
    fn truncated_block_recovers_to_empty() {
        let mut bytes = scene(&[text_block(&["hello"])]);
        bytes.truncate(bytes.len() - 3);
        assert_eq!(decode(&bytes), SceneDocument::default());
    }

    #[test]
    fn typed_text_blocks_join_with_newline() {
        let bytes = scene(&[text_block(&["First block"]), text_block(&["Second block"])]);
        let doc = decode(&bytes);
        assert_eq!(doc.typed_text().as_deref(), Some("First block\nSecond block"));
        assert!(!doc.has_strokes());
    }

    #[test]
    fn text_spans_concatenate() {
        let bytes = scene(&[text_block(&["Meeting ", "notes"])]);
        assert_eq!(decode(&bytes).typed_text().as_deref(), Some("Meeting notes"));
    }

    #[test]
    fn stroke_fields_round_trip() {
        let bytes = scene(&[stroke_block(1, 2.5, &[(0.0, 0.0), (10.0, 20.0)])]);
        let doc = decode(&bytes);
        let strokes: Vec<_> = doc.strokes().collect();
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].color, 1);
        assert_eq!(strokes[0].thickness, 2.5);
        assert_eq!(strokes[0].points[1], Point { x: 10.0, y: 20.0 });
    }

    #[test]
    fn single_point_stroke_counts_as_handwriting() {
        // Detection threshold is ≥ 1 point even though rendering needs ≥ 2.
        let bytes = scene(&[stroke_block(0, 2.0, &[(5.0, 5.0)])]);
        assert!(decode(&bytes).has_strokes());
    }

    #[test]
    fn deleted_line_items_are_ignored() {
        let payload = line_payload(ITEM_HAS_VALUE | ITEM_DELETED, 0, 2.0, &[(0.0, 0.0)]);
        let bytes = scene(&[block(BLOCK_LINE_ITEM, &payload)]);
        let doc = decode(&bytes);
        assert!(doc.blocks.is_empty());
    }

    #[test]
    fn valueless_line_items_are_ignored() {
        let payload = line_payload(0, 0, 2.0, &[]);
        let bytes = scene(&[block(BLOCK_LINE_ITEM, &payload)]);
        assert!(decode(&bytes).blocks.is_empty());
    }

    #[test]
    fn unknown_block_types_are_skipped() {
        let bytes = scene(&[
            block(0x0A, &[1, 2, 3, 4]), // page info: not content
            text_block(&["still here"]),
        ]);
        assert_eq!(decode(&bytes).typed_text().as_deref(), Some("still here"));
    }

    #[test]
    fn trailing_payload_bytes_are_tolerated() {
        let mut payload = line_payload(ITEM_HAS_VALUE, 0, 2.0, &[(0.0, 0.0), (1.0, 1.0)]);
        payload.extend_from_slice(&[0xAA; 6]); // newer optional fields
        let bytes = scene(&[block(BLOCK_LINE_ITEM, &payload)]);
        assert_eq!(decode(&bytes).strokes().count(), 1);
    }

    #[test]
    fn mixed_page_keeps_document_order() {
        let bytes = scene(&[
            text_block(&["typed"]),
            stroke_block(0, 2.0, &[(0.0, 0.0), (1.0, 1.0)]),
        ]);
        let doc = decode(&bytes);
        assert!(matches!(doc.blocks[0], SceneBlock::TypedText { .. }));
        assert!(matches!(doc.blocks[1], SceneBlock::Stroke(_)));
        assert!(doc.typed_text().is_some());
        assert!(doc.has_strokes());
    }

    #[test]
    fn invalid_utf8_text_recovers_to_empty() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(&[0xFF, 0xFE]);
        let bytes = scene(&[block(BLOCK_ROOT_TEXT, &payload)]);
        assert_eq!(decode(&bytes), SceneDocument::default());
    }
}
