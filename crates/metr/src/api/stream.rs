use serde_json::Value;
use tracing::{debug, warn};

use crate::markdown::render_markdown;

pub const DOCS_START_MARKER: &str = "---SUPPORTING_DOCS_START---";
pub const DOCS_END_MARKER: &str = "---SUPPORTING_DOCS_END---";

/// Rendering of all prose accumulated so far in the current segment
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedText {
    pub html: String,
    pub markdown: String,
}

/// A logical update produced while a search reply streams in
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Replaces the previous rendering of the reply
    Text(RenderedText),
    /// The supporting documents payload, delivered at most once per stream
    Documents(Value),
}

impl StreamUpdate {
    pub fn as_text(&self) -> Option<&RenderedText> {
        match self {
            StreamUpdate::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_documents(&self) -> Option<&Value> {
        match self {
            StreamUpdate::Documents(docs) => Some(docs),
            _ => None,
        }
    }
}

/// Incremental UTF-8 decoder that carries incomplete sequences between chunks
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` as possible; invalid sequences become U+FFFD
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut output = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    output.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = consumed + err.valid_up_to();
                    output.push_str(&String::from_utf8_lossy(
                        &self.pending[consumed..valid_up_to],
                    ));
                    match err.error_len() {
                        Some(len) => {
                            output.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                        // incomplete sequence at the end, wait for more bytes
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        output
    }

    /// Flush whatever is left once no more bytes will arrive
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// State machine splitting a search reply into rendered prose and the
/// supporting documents block.
///
/// The reply is Markdown with at most one JSON block wrapped in
/// [`DOCS_START_MARKER`] and [`DOCS_END_MARKER`]. Markers can straddle chunk
/// boundaries, so detection runs on an accumulating buffer and a marker is
/// only acted on once its full literal is present.
#[derive(Debug, Default)]
pub struct StreamProcessor {
    decoder: Utf8Decoder,
    buffer: String,
    accumulated_markdown: String,
    dirty: bool,
    documents_delivered: bool,
}

impl StreamProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the response body
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamUpdate> {
        let text = self.decoder.decode(bytes);
        self.buffer.push_str(&text);

        let mut updates = Vec::new();
        if text.trim().is_empty() {
            return updates;
        }
        self.scan(&mut updates);
        updates
    }

    /// Flush buffered text once the stream has ended
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);

        let mut updates = Vec::new();
        self.scan(&mut updates);

        let mut rest = std::mem::take(&mut self.buffer);
        if let Some(body) = rest.strip_prefix(DOCS_START_MARKER) {
            warn!("Supporting documents block was never closed, rendering it as text");
            rest = body.to_string();
        }
        self.append_markdown(&rest, &mut updates);

        if self.dirty && !self.accumulated_markdown.trim().is_empty() {
            self.emit_text(&mut updates);
        }
        updates
    }

    fn scan(&mut self, updates: &mut Vec<StreamUpdate>) {
        loop {
            let Some(start) = self.buffer.find(DOCS_START_MARKER) else {
                let held = partial_marker_len(&self.buffer, DOCS_START_MARKER);
                let ready: String = self.buffer.drain(..self.buffer.len() - held).collect();
                self.append_markdown(&ready, updates);
                return;
            };

            let before: String = self.buffer.drain(..start).collect();
            self.append_markdown(&before, updates);

            let body_start = DOCS_START_MARKER.len();
            let Some(body_len) = self.buffer[body_start..].find(DOCS_END_MARKER) else {
                // block still open; keep it buffered from the start marker on
                return;
            };
            let body_end = body_start + body_len;
            let docs_json = self.buffer[body_start..body_end].trim().to_string();
            self.buffer.drain(..body_end + DOCS_END_MARKER.len());

            self.deliver_documents(&docs_json, updates);
            self.accumulated_markdown.clear();
            self.dirty = false;
        }
    }

    fn append_markdown(&mut self, text: &str, updates: &mut Vec<StreamUpdate>) {
        if text.is_empty() {
            return;
        }
        self.accumulated_markdown.push_str(text);
        self.dirty = true;
        if !text.trim().is_empty() {
            self.emit_text(updates);
        }
    }

    fn emit_text(&mut self, updates: &mut Vec<StreamUpdate>) {
        updates.push(StreamUpdate::Text(RenderedText {
            html: render_markdown(&self.accumulated_markdown),
            markdown: self.accumulated_markdown.clone(),
        }));
        self.dirty = false;
    }

    fn deliver_documents(&mut self, docs_json: &str, updates: &mut Vec<StreamUpdate>) {
        match serde_json::from_str::<Value>(docs_json) {
            Ok(_) if self.documents_delivered => {
                warn!("Dropping extra supporting documents block");
            }
            Ok(docs) => {
                debug!("Received supporting documents");
                self.documents_delivered = true;
                updates.push(StreamUpdate::Documents(docs));
            }
            Err(err) => {
                warn!(error = %err, "Failed to parse supporting documents");
            }
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Vec<StreamUpdate> {
        let mut processor = StreamProcessor::new();
        let mut updates = Vec::new();
        for chunk in chunks {
            updates.extend(processor.push(chunk));
        }
        updates.extend(processor.finish());
        updates
    }

    fn split_at(bytes: &[u8], at: usize) -> Vec<StreamUpdate> {
        run_chunks([&bytes[..at], &bytes[at..]])
    }

    fn last_text(updates: &[StreamUpdate]) -> Option<&RenderedText> {
        updates.iter().rev().find_map(StreamUpdate::as_text)
    }

    fn documents(updates: &[StreamUpdate]) -> Vec<&Value> {
        updates.iter().filter_map(StreamUpdate::as_documents).collect()
    }

    fn docs_stream(docs: &str) -> String {
        format!("A{}{}{}B", DOCS_START_MARKER, docs, DOCS_END_MARKER)
    }

    #[test]
    fn test_plain_markdown_is_chunk_boundary_invariant() {
        let text = "# Título\n\nSome *emphasis* and a list --- with dashes:\n\n- one\n- two\n\n\
                    ```rust\nfn main() {}\n```\n\nCafé 世界 ends here --";
        let expected = render_markdown(text);

        for size in 1..=text.len() {
            let updates = run_chunks(text.as_bytes().chunks(size));
            let last = last_text(&updates).expect("expected a text update");
            assert_eq!(last.markdown, text, "chunk size {}", size);
            assert_eq!(last.html, expected, "chunk size {}", size);
            assert!(documents(&updates).is_empty());
        }
    }

    #[test]
    fn test_documents_block_under_every_split() {
        let stream = docs_stream(r#"{"docs":[1,2]}"#);
        let bytes = stream.as_bytes();

        let mut runs: Vec<Vec<StreamUpdate>> = (0..=bytes.len()).map(|at| split_at(bytes, at)).collect();
        runs.push(run_chunks(bytes.chunks(1)));

        for updates in runs {
            let docs = documents(&updates);
            assert_eq!(docs, vec![&json!({"docs": [1, 2]})]);

            let docs_index = updates
                .iter()
                .position(|u| u.as_documents().is_some())
                .unwrap();
            let (before, after) = updates.split_at(docs_index);

            assert!(!before.is_empty());
            for update in before {
                let text = update.as_text().unwrap();
                assert_eq!(text.markdown, "A");
                assert_eq!(text.html, "<p>A</p>\n");
            }
            let after_text = last_text(&after[1..]).expect("text after documents");
            assert_eq!(after_text.markdown, "B");
            assert_eq!(after_text.html, "<p>B</p>\n");
        }
    }

    #[test]
    fn test_unterminated_block_emits_no_documents() {
        let stream = format!("Intro\n\n{}{{\"docs\": [1", DOCS_START_MARKER);
        let mut processor = StreamProcessor::new();

        let updates = processor.push(stream.as_bytes());
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].as_text().unwrap().html, "<p>Intro</p>\n");

        assert!(processor.push(b"\n\nMore text").is_empty());

        let updates = processor.finish();
        assert!(documents(&updates).is_empty());
        let last = last_text(&updates).unwrap();
        assert!(last.html.contains("More text"));
        assert!(last.html.contains("Intro"));
        assert!(!last.markdown.contains(DOCS_START_MARKER));
    }

    #[test]
    fn test_unterminated_block_under_every_split() {
        let stream = format!("Intro\n\n{}tail", DOCS_START_MARKER);
        let bytes = stream.as_bytes();
        let expected = last_text(&run_chunks([bytes])).unwrap().clone();
        assert_eq!(expected.markdown, "Intro\n\ntail");
        assert_eq!(expected.html, "<p>Intro</p>\n<p>tail</p>\n");

        for at in 1..bytes.len() {
            let updates = split_at(bytes, at);
            assert!(documents(&updates).is_empty(), "split at {}", at);
            assert_eq!(last_text(&updates), Some(&expected), "split at {}", at);
        }
    }

    #[test]
    fn test_malformed_documents_are_dropped() {
        let stream = docs_stream(r#"{"docs":"#);
        let updates = run_chunks([stream.as_bytes()]);

        assert!(documents(&updates).is_empty());
        let texts: Vec<&str> = updates
            .iter()
            .filter_map(StreamUpdate::as_text)
            .map(|t| t.markdown.as_str())
            .collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn test_second_documents_block_is_not_delivered() {
        let stream = format!(
            "A{s}{{\"a\":1}}{e}B{s}{{\"b\":2}}{e}C",
            s = DOCS_START_MARKER,
            e = DOCS_END_MARKER
        );
        let updates = run_chunks([stream.as_bytes()]);

        assert_eq!(documents(&updates), vec![&json!({"a": 1})]);
        assert_eq!(last_text(&updates).unwrap().markdown, "C");
    }

    #[test]
    fn test_documents_json_is_trimmed() {
        let stream = format!(
            "Answer\n{}\n  {{\"docs\": []}}\n{}\n",
            DOCS_START_MARKER, DOCS_END_MARKER
        );
        let updates = run_chunks([stream.as_bytes()]);
        assert_eq!(documents(&updates), vec![&json!({"docs": []})]);
    }

    #[test]
    fn test_whitespace_chunk_is_carried_not_emitted() {
        let mut processor = StreamProcessor::new();
        assert_eq!(processor.push(b"Hello").len(), 1);
        assert!(processor.push(b"\n\n").is_empty());

        let updates = processor.push(b"World");
        let text = updates[0].as_text().unwrap();
        assert_eq!(text.markdown, "Hello\n\nWorld");
        assert_eq!(text.html, "<p>Hello</p>\n<p>World</p>\n");
    }

    #[test]
    fn test_dash_run_resembling_marker_is_rendered() {
        let mut processor = StreamProcessor::new();
        let updates = processor.push(b"Line ---");
        assert_eq!(updates[0].as_text().unwrap().markdown, "Line ");

        let updates = processor.finish();
        assert_eq!(last_text(&updates).unwrap().markdown, "Line ---");
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "café ☕".as_bytes();
        let e_acute = bytes.iter().position(|&b| b == 0xC3).unwrap();
        let cup = bytes.len() - 2;

        let updates = run_chunks([
            &bytes[..e_acute + 1],
            &bytes[e_acute + 1..cup],
            &bytes[cup..],
        ]);
        let last = last_text(&updates).unwrap();
        assert_eq!(last.markdown, "café ☕");
        assert_eq!(last.html, "<p>café ☕</p>\n");
        assert!(!last.html.contains(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_decoder_flushes_truncated_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x98]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_partial_marker_len() {
        assert_eq!(partial_marker_len("abc---SUPP", DOCS_START_MARKER), 7);
        assert_eq!(partial_marker_len("abc-", DOCS_START_MARKER), 1);
        assert_eq!(partial_marker_len("abc", DOCS_START_MARKER), 0);
        assert_eq!(partial_marker_len("", DOCS_START_MARKER), 0);
    }
}
