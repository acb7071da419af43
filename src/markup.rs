/*!
 * Markup classification for LaTeX sources.
 *
 * The classifier scans a document left to right and splits it into an
 * ordered list of spans covering the input with no gaps. PROTECTED spans
 * (commands, math, comments, verbatim-like environments, grouping braces)
 * must pass through translation unchanged; everything else is TRANSLATABLE.
 *
 * An unterminated construct is never an error: it is protected up to the end
 * of the document and reported as a `ClassificationWarning`.
 */

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

/// Whether a span may be translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanKind {
    Protected,
    Translatable,
}

/// A contiguous region of the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
    /// Byte offset of the first byte
    pub start: usize,
    /// Byte offset one past the last byte
    pub end: usize,
}

impl Span {
    pub fn new(kind: SpanKind, text: &str, start: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            start,
            end: start + text.len(),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.kind == SpanKind::Protected
    }
}

/// A classified document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    spans: Vec<Span>,
}

impl Document {
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Byte length of the source
    pub fn len(&self) -> usize {
        self.spans.last().map(|s| s.end).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Concatenation of all spans; equals the source text
    pub fn reconstruct(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn protected_spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.is_protected())
    }
}

/// A construct that was not closed before the end of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationWarning {
    /// Byte offset where the construct opens
    pub offset: usize,
    /// The opening delimiter or command
    pub construct: String,
}

/// Output of the classifier
#[derive(Debug, Clone)]
pub struct Classification {
    pub document: Document,
    pub warnings: Vec<ClassificationWarning>,
}

/// Which LaTeX constructs are protected beyond the built-in syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupPatterns {
    /// Commands whose bracket/brace arguments are protected along with the command
    #[serde(default = "default_protected_argument_commands")]
    pub protected_argument_commands: Vec<String>,

    /// Environments whose whole body is protected
    #[serde(default = "default_protected_environments")]
    pub protected_environments: Vec<String>,

    /// Whether `%` comments are protected
    #[serde(default = "default_true")]
    pub protect_comments: bool,
}

impl Default for MarkupPatterns {
    fn default() -> Self {
        Self {
            protected_argument_commands: default_protected_argument_commands(),
            protected_environments: default_protected_environments(),
            protect_comments: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_protected_argument_commands() -> Vec<String> {
    [
        "documentclass", "usepackage", "label", "ref", "eqref", "pageref", "autoref",
        "cref", "Cref", "cite", "citep", "citet", "nocite", "includegraphics", "input",
        "include", "bibliography", "bibliographystyle", "url", "href", "newcommand",
        "renewcommand", "providecommand", "newenvironment", "renewenvironment",
        "setlength", "addtolength", "setcounter", "addtocounter", "vspace", "hspace",
        "definecolor", "color", "textcolor", "hypersetup", "geometry", "graphicspath",
        "lstinputlisting",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_protected_environments() -> Vec<String> {
    [
        "equation", "equation*", "align", "align*", "alignat", "alignat*", "gather",
        "gather*", "multline", "multline*", "eqnarray", "eqnarray*", "math", "displaymath",
        "verbatim", "verbatim*", "lstlisting", "minted", "tikzpicture", "comment",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Left-to-right LaTeX classifier
#[derive(Debug, Clone)]
pub struct MarkupClassifier {
    argument_commands: HashSet<String>,
    environments: HashSet<String>,
    protect_comments: bool,
}

impl Default for MarkupClassifier {
    fn default() -> Self {
        Self::new(&MarkupPatterns::default())
    }
}

impl MarkupClassifier {
    pub fn new(patterns: &MarkupPatterns) -> Self {
        Self {
            argument_commands: patterns.protected_argument_commands.iter().cloned().collect(),
            environments: patterns.protected_environments.iter().cloned().collect(),
            protect_comments: patterns.protect_comments,
        }
    }

    /// Classify the whole input into spans
    pub fn classify(&self, text: &str) -> Classification {
        let mut scanner = Scanner::new(text);

        while scanner.pos < scanner.bytes.len() {
            let start = scanner.pos;
            match scanner.bytes[start] {
                b'%' if self.protect_comments => {
                    let end = text[start..].find('\n').map(|i| start + i).unwrap_or(text.len());
                    scanner.protect(start, end);
                }
                b'$' => self.scan_dollar_math(&mut scanner),
                b'\\' => self.scan_backslash(&mut scanner),
                b'{' | b'}' => scanner.protect(start, start + 1),
                _ => scanner.pos += 1,
            }
        }

        scanner.finish()
    }

    fn scan_dollar_math(&self, scanner: &mut Scanner<'_>) {
        let start = scanner.pos;
        let delimiter = if scanner.bytes.get(start + 1) == Some(&b'$') { "$$" } else { "$" };
        match scanner.find_unescaped(start + delimiter.len(), delimiter) {
            Some(close) => scanner.protect(start, close + delimiter.len()),
            None => scanner.protect_unterminated(start, delimiter),
        }
    }

    fn scan_backslash(&self, scanner: &mut Scanner<'_>) {
        let start = scanner.pos;
        let text = scanner.text;
        let Some(next) = text[start + 1..].chars().next() else {
            scanner.protect(start, start + 1);
            return;
        };

        match next {
            '(' => match scanner.find_closing(start + 2, "\\(", "\\)") {
                Some(end) => scanner.protect(start, end),
                None => scanner.protect_unterminated(start, "\\("),
            },
            '[' => match scanner.find_closing(start + 2, "\\[", "\\]") {
                Some(end) => scanner.protect(start, end),
                None => scanner.protect_unterminated(start, "\\["),
            },
            c if c.is_ascii_alphabetic() || c == '@' => self.scan_command(scanner),
            c => scanner.protect(start, start + 1 + c.len_utf8()),
        }
    }

    fn scan_command(&self, scanner: &mut Scanner<'_>) {
        let start = scanner.pos;
        let text = scanner.text;
        let bytes = scanner.bytes;
        let mut end = start + 1;
        while end < bytes.len() && (bytes[end].is_ascii_alphabetic() || bytes[end] == b'@') {
            end += 1;
        }
        let name = &text[start + 1..end];
        if bytes.get(end) == Some(&b'*') {
            end += 1;
        }

        match name {
            "begin" => self.scan_begin(scanner, start, end),
            "end" => match scanner.consume_arguments(end, 1) {
                Ok(args_end) => scanner.protect(start, args_end),
                Err(open) => scanner.protect_unterminated(open, "{"),
            },
            _ if self.argument_commands.contains(name) => {
                match scanner.consume_arguments(end, usize::MAX) {
                    Ok(args_end) => scanner.protect(start, args_end),
                    Err(open) => scanner.protect_unterminated(open, "{"),
                }
            }
            _ => scanner.protect(start, end),
        }
    }

    fn scan_begin(&self, scanner: &mut Scanner<'_>, start: usize, name_end: usize) {
        let Some((env, env_end)) = scanner.environment_name(name_end) else {
            scanner.protect(start, name_end);
            return;
        };

        if self.environments.contains(env) {
            let open = format!("\\begin{{{}}}", env);
            let close = format!("\\end{{{}}}", env);
            match scanner.find_closing(env_end, &open, &close) {
                Some(end) => scanner.protect(start, end),
                None => scanner.protect_unterminated(start, &open),
            }
        } else {
            match scanner.consume_arguments(env_end, usize::MAX) {
                Ok(args_end) => scanner.protect(start, args_end),
                Err(open) => scanner.protect_unterminated(open, "{"),
            }
        }
    }
}

/// Byte-level cursor over the source; all delimiters are ASCII so slicing at
/// their positions always lands on char boundaries.
struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    plain_start: usize,
    spans: Vec<Span>,
    warnings: Vec<ClassificationWarning>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            plain_start: 0,
            spans: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn push(&mut self, kind: SpanKind, start: usize, end: usize) {
        if start >= end {
            return;
        }
        if let Some(last) = self.spans.last_mut() {
            if last.kind == kind && last.end == start {
                last.text.push_str(&self.text[start..end]);
                last.end = end;
                return;
            }
        }
        self.spans.push(Span::new(kind, &self.text[start..end], start));
    }

    fn protect(&mut self, start: usize, end: usize) {
        self.push(SpanKind::Translatable, self.plain_start, start);
        self.push(SpanKind::Protected, start, end);
        self.pos = end;
        self.plain_start = end;
    }

    fn protect_unterminated(&mut self, offset: usize, construct: &str) {
        warn!(
            "Unterminated {} at byte {}; protecting to end of document",
            construct, offset
        );
        self.warnings.push(ClassificationWarning {
            offset,
            construct: construct.to_string(),
        });
        let start = self.pos;
        self.protect(start, self.text.len());
    }

    fn finish(mut self) -> Classification {
        self.push(SpanKind::Translatable, self.plain_start, self.text.len());
        Classification {
            document: Document { spans: self.spans },
            warnings: self.warnings,
        }
    }

    /// Whether the byte at `pos` is preceded by an odd run of backslashes
    fn is_escaped(&self, pos: usize) -> bool {
        let mut count = 0;
        let mut i = pos;
        while i > 0 && self.bytes[i - 1] == b'\\' {
            count += 1;
            i -= 1;
        }
        count % 2 == 1
    }

    fn find_unescaped(&self, from: usize, pattern: &str) -> Option<usize> {
        let mut cursor = from;
        while cursor <= self.text.len() {
            let found = cursor + self.text[cursor..].find(pattern)?;
            if !self.is_escaped(found) {
                return Some(found);
            }
            cursor = found + 1;
        }
        None
    }

    /// End offset of the close delimiter matching an already-consumed open
    /// delimiter, tracking nested opens with a depth counter
    fn find_closing(&self, from: usize, open: &str, close: &str) -> Option<usize> {
        let mut depth = 1usize;
        let mut cursor = from;
        loop {
            let next_close = self.find_unescaped(cursor, close)?;
            match self.find_unescaped(cursor, open) {
                Some(next_open) if next_open < next_close => {
                    depth += 1;
                    cursor = next_open + open.len();
                }
                _ => {
                    depth -= 1;
                    cursor = next_close + close.len();
                    if depth == 0 {
                        return Some(cursor);
                    }
                }
            }
        }
    }

    /// End offset of a balanced group opening at `open_pos`
    fn match_group(&self, open_pos: usize) -> Option<usize> {
        let (open, close) = match self.bytes[open_pos] {
            b'{' => (b'{', b'}'),
            _ => (b'[', b']'),
        };
        let mut depth = 0usize;
        let mut i = open_pos;
        while i < self.bytes.len() {
            let b = self.bytes[i];
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == open {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            i += 1;
        }
        None
    }

    /// Consume up to `limit` `[..]`/`{..}` groups directly following `from`,
    /// allowing spaces between them. Returns the end offset or, for an
    /// unterminated group, its opening offset.
    fn consume_arguments(&self, from: usize, limit: usize) -> Result<usize, usize> {
        let mut end = from;
        let mut consumed = 0;
        while consumed < limit {
            let mut peek = end;
            while peek < self.bytes.len() && (self.bytes[peek] == b' ' || self.bytes[peek] == b'\t') {
                peek += 1;
            }
            match self.bytes.get(peek) {
                Some(b'{') | Some(b'[') => {
                    end = self.match_group(peek).ok_or(peek)?;
                    consumed += 1;
                }
                _ => break,
            }
        }
        Ok(end)
    }

    /// Name inside the `{..}` following `\begin`, and the offset after the group
    fn environment_name(&self, from: usize) -> Option<(&'a str, usize)> {
        if self.bytes.get(from) != Some(&b'{') {
            return None;
        }
        let close = from + self.text[from..].find('}')?;
        Some((&self.text[from + 1..close], close + 1))
    }
}
