/// Events emitted during a streaming LLM response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    TextDelta { text: String },

    /// Fragment of a tool call. Fragments sharing an `index` belong to the
    /// same call; `name` and `arguments` arrive as string pieces that the
    /// consumer concatenates in order.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },

    /// Stream completed successfully.
    Done { stop_reason: String },

    /// Error after the stream opened. Terminal — no further events follow.
    Error { message: String },
}

/// Parse a single SSE line (`event: <type>` or `data: <payload>`).
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ")
            .map(|data| SseParsed::Data(data.to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_lines() {
        match parse_sse_line("data: {\"x\":1}") {
            Some(SseParsed::Data(d)) => assert_eq!(d, "{\"x\":1}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_event_lines() {
        match parse_sse_line("event: message_stop") {
            Some(SseParsed::Event(e)) => assert_eq!(e, "message_stop"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ignores_other_lines() {
        assert!(parse_sse_line(": keepalive").is_none());
    }
}
