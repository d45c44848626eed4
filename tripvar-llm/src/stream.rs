//! Incremental assembly of streamed completions.
//!
//! The upstream sends newline-delimited `data: {json}` lines and ends with
//! `data: [DONE]`. Keep-alive comments, blank lines and malformed fragments are
//! expected and skipped. A stream that closes early still yields its text, but
//! with a locally derived finish reason so callers can tell it was cut short.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tracing::{trace, warn};
use tripvar_core::{finish_reason, StreamEvent, TripvarError};

use crate::openai_compatible::ChatCompletionChunk;
use crate::transport::FragmentStream;

const DONE_SENTINEL: &str = "[DONE]";

/// Splits a byte stream on `\n`. A trailing unterminated line is flushed at EOF.
pub fn fragment_lines<S>(chunks: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, TripvarError>> + Send + 'static,
{
    struct Splitter {
        chunks: BoxStream<'static, Result<Bytes, TripvarError>>,
        buffer: BytesMut,
        pending: VecDeque<String>,
        finished: bool,
    }

    let splitter = Splitter {
        chunks: chunks.boxed(),
        buffer: BytesMut::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(splitter, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    while let Some(pos) = state.buffer.iter().position(|&b| b == b'\n') {
                        let line = state.buffer.split_to(pos + 1);
                        state
                            .pending
                            .push_back(String::from_utf8_lossy(&line).into_owned());
                    }
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    if !state.buffer.is_empty() {
                        let rest = state.buffer.split();
                        state
                            .pending
                            .push_back(String::from_utf8_lossy(&rest).into_owned());
                    }
                }
            }
        }
    })
    .boxed()
}

/// One decoded increment of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    pub content: String,
    pub finish_reason: Option<String>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentDecode {
    /// Blank, comment, `event:` or unparsable line.
    Skip,
    Delta(StreamDelta),
    Done,
}

pub fn decode_fragment(raw_line: &str) -> FragmentDecode {
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
        return FragmentDecode::Skip;
    }

    let data = line
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(line);
    if data == DONE_SENTINEL {
        return FragmentDecode::Done;
    }

    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            trace!(error = %err, line = data, "dropping malformed stream fragment");
            return FragmentDecode::Skip;
        }
    };

    let total_tokens = chunk.usage.and_then(|usage| usage.total_tokens);
    let Some(choice) = chunk.choices.into_iter().next() else {
        return match total_tokens {
            Some(_) => FragmentDecode::Delta(StreamDelta {
                total_tokens,
                ..StreamDelta::default()
            }),
            None => FragmentDecode::Skip,
        };
    };

    let content = choice
        .delta
        .and_then(|delta| delta.content)
        .or(choice.text)
        .unwrap_or_default();
    if content.is_empty() && choice.finish_reason.is_none() && total_tokens.is_none() {
        return FragmentDecode::Skip;
    }

    FragmentDecode::Delta(StreamDelta {
        content,
        finish_reason: choice.finish_reason,
        total_tokens,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblerState {
    #[default]
    Accumulating,
    Done,
}

/// How the fragment source ended when the sentinel was never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Closed,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledText {
    pub text: String,
    pub finish_reason: String,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Default)]
pub struct StreamAssembler {
    state: AssemblerState,
    text: String,
    finish_reason: Option<String>,
    total_tokens: Option<u32>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == AssemblerState::Done
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Feeds one raw line. Returns the content appended by it, if any. Lines
    /// after the sentinel are ignored.
    pub fn push_line(&mut self, raw_line: &str) -> Option<String> {
        if self.is_done() {
            return None;
        }
        match decode_fragment(raw_line) {
            FragmentDecode::Skip => None,
            FragmentDecode::Done => {
                self.state = AssemblerState::Done;
                None
            }
            FragmentDecode::Delta(delta) => {
                if delta.finish_reason.is_some() {
                    self.finish_reason = delta.finish_reason;
                }
                if delta.total_tokens.is_some() {
                    self.total_tokens = delta.total_tokens;
                }
                if delta.content.is_empty() {
                    None
                } else {
                    self.text.push_str(&delta.content);
                    Some(delta.content)
                }
            }
        }
    }

    /// `end` only matters when the sentinel was not seen: an early close is
    /// reported as incomplete even if the upstream sent a finish reason.
    pub fn finish(self, end: StreamEnd) -> AssembledText {
        let finish_reason = match (self.state, end) {
            (AssemblerState::Done, _) => self
                .finish_reason
                .unwrap_or_else(|| finish_reason::DONE.to_string()),
            (AssemblerState::Accumulating, StreamEnd::Closed) => {
                finish_reason::INCOMPLETE.to_string()
            }
            (AssemblerState::Accumulating, StreamEnd::Interrupted) => {
                finish_reason::INTERRUPTED.to_string()
            }
        };
        AssembledText {
            text: self.text,
            finish_reason,
            total_tokens: self.total_tokens,
        }
    }
}

/// Drains `lines` into a single text. A transport error after some text has
/// arrived yields the partial text; with nothing accumulated the error is returned.
pub async fn consume(mut lines: FragmentStream) -> Result<AssembledText, TripvarError> {
    let mut assembler = StreamAssembler::new();
    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                assembler.push_line(&line);
                if assembler.is_done() {
                    return Ok(assembler.finish(StreamEnd::Closed));
                }
            }
            Err(err) if assembler.text().is_empty() => return Err(err),
            Err(err) => {
                warn!(error = %err, received = assembler.text().len(), "stream interrupted, keeping partial text");
                return Ok(assembler.finish(StreamEnd::Interrupted));
            }
        }
    }

    let assembled = assembler.finish(StreamEnd::Closed);
    warn!(
        received = assembled.text.len(),
        "stream closed without [DONE] sentinel"
    );
    Ok(assembled)
}

/// Streaming form of [`consume`]: one `ContentChunk` per delta, then a
/// `finish_reason` metadata event and the `FinalAnswer`. A stream that ends
/// without any text yields an empty-output upstream error instead.
pub fn assemble_events(lines: FragmentStream) -> BoxStream<'static, Result<StreamEvent, TripvarError>> {
    struct Assembly {
        lines: FragmentStream,
        assembler: StreamAssembler,
        tail: VecDeque<Result<StreamEvent, TripvarError>>,
        finished: bool,
    }

    let assembly = Assembly {
        lines,
        assembler: StreamAssembler::new(),
        tail: VecDeque::new(),
        finished: false,
    };

    stream::unfold(assembly, |mut state| async move {
        loop {
            if let Some(event) = state.tail.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }

            let end = match state.lines.next().await {
                Some(Ok(line)) => {
                    if let Some(content) = state.assembler.push_line(&line) {
                        return Some((Ok(StreamEvent::ContentChunk(content)), state));
                    }
                    if !state.assembler.is_done() {
                        continue;
                    }
                    StreamEnd::Closed
                }
                Some(Err(err)) if state.assembler.text().is_empty() => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                Some(Err(err)) => {
                    warn!(error = %err, "stream interrupted, keeping partial text");
                    StreamEnd::Interrupted
                }
                None => StreamEnd::Closed,
            };

            state.finished = true;
            state.lines = stream::empty().boxed();
            let assembled = std::mem::take(&mut state.assembler).finish(end);
            if assembled.text.trim().is_empty() {
                state
                    .tail
                    .push_back(Err(TripvarError::empty_output("completion stream")));
                continue;
            }
            state.tail.push_back(Ok(StreamEvent::Metadata {
                key: "finish_reason".to_string(),
                value: Value::String(assembled.finish_reason),
            }));
            state.tail.push_back(Ok(StreamEvent::FinalAnswer(assembled.text)));
        }
    })
    .boxed()
}
