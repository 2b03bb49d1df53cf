const DIAGRAM_LANGUAGE: &str = "mermaid";

#[derive(Debug, Clone, Copy)]
struct Fence {
    ch: u8,
    len: usize,
}

impl Fence {
    /// Find the first run of this fence's character, at least as long as the
    /// opening run, anywhere in `line`. Returns the text before that run.
    fn find_close<'a>(&self, line: &'a str) -> Option<&'a str> {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != self.ch {
                i += 1;
                continue;
            }
            let run = bytes[i..].iter().take_while(|&&c| c == self.ch).count();
            if run >= self.len {
                return Some(&line[..i]);
            }
            i += run;
        }
        None
    }
}

/// Locate an opening fence tagged with the diagram language anywhere in
/// `line`. Returns the fence and whatever follows the tag.
fn find_opening(line: &str) -> Option<(Fence, &str)> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'`' && b != b'~' {
            i += 1;
            continue;
        }
        let run = bytes[i..].iter().take_while(|&&c| c == b).count();
        if run >= 3 {
            if let Some(rest) = strip_language(&line[i + run..]) {
                return Some((Fence { ch: b, len: run }, rest));
            }
        }
        i += run;
    }
    None
}

fn strip_language(info: &str) -> Option<&str> {
    let info = info.trim_start_matches([' ', '\t']);
    let tag = info.get(..DIAGRAM_LANGUAGE.len())?;
    if !tag.eq_ignore_ascii_case(DIAGRAM_LANGUAGE) {
        return None;
    }
    let rest = &info[DIAGRAM_LANGUAGE.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '`' || c == '~' || c == '{' => Some(rest),
        Some(_) => None,
    }
}

/// Return the body of the first complete fenced `mermaid` block in `text`.
///
/// Fences may use backticks or tildes. A block closes at the first run of
/// the same character at least as long as the opening one, wherever it sits
/// in a line, so a longer outer fence can carry shorter inner fences. Text
/// after the closing run is dropped. Text after the tag on the opening line
/// belongs to the body, which also makes the one-line form work.
///
/// Unterminated blocks are not matches. Blank blocks are deliberately passed
/// over in favour of the next block rather than returned as an empty diagram.
pub fn extract_diagram(text: &str) -> Option<String> {
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some((fence, rest)) = find_opening(line) else {
            continue;
        };

        let mut body = String::new();
        let mut closed = false;

        let rest = rest.trim();
        if let Some(inner) = fence.find_close(rest) {
            body.push_str(inner);
            closed = true;
        } else if !rest.is_empty() {
            body.push_str(rest);
            body.push('\n');
        }

        if !closed {
            for line in lines.by_ref() {
                if let Some(prefix) = fence.find_close(line) {
                    body.push_str(prefix);
                    closed = true;
                    break;
                }
                body.push_str(line);
                body.push('\n');
            }
        }

        if !closed {
            return None;
        }
        let diagram = body.trim();
        if !diagram.is_empty() {
            return Some(diagram.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trimmed_block() {
        let reply = "Summary...\n\n```mermaid\nsequenceDiagram\n A->>B: call\n```\nDone.";
        assert_eq!(
            extract_diagram(reply).as_deref(),
            Some("sequenceDiagram\n A->>B: call")
        );
    }

    #[test]
    fn no_block_is_none() {
        assert_eq!(extract_diagram("The code defines a REST controller."), None);
        assert_eq!(extract_diagram(""), None);
    }

    #[test]
    fn skips_blocks_in_other_languages() {
        let reply = "```java\nclass A {}\n```\n\n```mermaid\ngraph TD\n  A --> B\n```";
        assert_eq!(extract_diagram(reply).as_deref(), Some("graph TD\n  A --> B"));
    }

    #[test]
    fn first_diagram_wins() {
        let reply = "```mermaid\ngraph LR\n```\ntext\n```mermaid\npie\n```";
        assert_eq!(extract_diagram(reply).as_deref(), Some("graph LR"));
    }

    #[test]
    fn longer_fence_carries_inner_fences() {
        let reply = "````mermaid\ngraph TD\n  A[\"```code```\"] --> B\n```\n  B --> C\n````";
        assert_eq!(
            extract_diagram(reply).as_deref(),
            Some("graph TD\n  A[\"```code```\"] --> B\n```\n  B --> C")
        );
    }

    #[test]
    fn tag_is_case_insensitive_and_tildes_work() {
        assert_eq!(
            extract_diagram("~~~Mermaid\ngraph TD\n~~~").as_deref(),
            Some("graph TD")
        );
        assert_eq!(
            extract_diagram("``` MERMAID title=flow\ngraph TD\n```").as_deref(),
            Some("title=flow\ngraph TD")
        );
    }

    #[test]
    fn one_line_block() {
        assert_eq!(
            extract_diagram("Here: ```mermaid graph TD; A-->B```").as_deref(),
            Some("graph TD; A-->B")
        );
    }

    #[test]
    fn closing_fence_may_trail_content() {
        assert_eq!(
            extract_diagram("```mermaid\ngraph TD\nA-->B```").as_deref(),
            Some("graph TD\nA-->B")
        );
    }

    #[test]
    fn prose_after_closing_fence_is_dropped() {
        let reply = "```mermaid\ngraph TD\n  A --> B\n``` That covers the flow.\nThanks.";
        assert_eq!(extract_diagram(reply).as_deref(), Some("graph TD\n  A --> B"));
    }

    #[test]
    fn annotated_close_does_not_swallow_next_block() {
        let reply = "```mermaid\ngraph LR\n  A --> B\n``` (above)\n\nAlt:\n```mermaid\ngraph TD\n```";
        assert_eq!(extract_diagram(reply).as_deref(), Some("graph LR\n  A --> B"));
    }

    #[test]
    fn shorter_run_mid_line_does_not_close() {
        let reply = "````mermaid\ngraph TD\n  A[\"```\"] --> B ```\n```` done";
        assert_eq!(
            extract_diagram(reply).as_deref(),
            Some("graph TD\n  A[\"```\"] --> B ```")
        );
    }

    #[test]
    fn similar_tags_do_not_match() {
        assert_eq!(extract_diagram("```mermaidjs\ngraph TD\n```"), None);
    }

    #[test]
    fn unterminated_block_is_none() {
        assert_eq!(extract_diagram("```mermaid\ngraph TD\n  A --> B"), None);
    }

    #[test]
    fn blank_block_is_passed_over() {
        let reply = "```mermaid\n\n```\n```mermaid\ngraph TD\n```";
        assert_eq!(extract_diagram(reply).as_deref(), Some("graph TD"));
    }

    #[test]
    fn odd_inputs_never_panic() {
        for input in [
            "```",
            "``````",
            "~~~~",
            "```mermai",
            "```mermaid",
            "é```mermaid ü```",
            "\r\n```mermaid\r\ngraph TD\r\n```\r\n",
            "`` `mermaid` ``",
        ] {
            let _ = extract_diagram(input);
        }
        assert_eq!(
            extract_diagram("\r\n```mermaid\r\ngraph TD\r\n```\r\n").as_deref(),
            Some("graph TD")
        );
    }
}
