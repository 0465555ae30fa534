//! Assistant conversation and answer rendering

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// How a line of an assistant answer should be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Heading,
    Bullet,
    Paragraph,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredChunk {
    pub kind: ChunkKind,
    pub text: String,
}

impl StructuredChunk {
    pub fn new(kind: ChunkKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Split a (possibly partial) markdown-ish answer into display chunks
pub fn format_response_chunks(raw: &str) -> Vec<StructuredChunk> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(classify_line)
        .collect()
}

fn classify_line(line: &str) -> StructuredChunk {
    if is_heading(line) {
        StructuredChunk::new(ChunkKind::Heading, line.replace("**", ""))
    } else if let Some(rest) = strip_bullet(line) {
        StructuredChunk::new(ChunkKind::Bullet, rest.replace("**", ""))
    } else if line.starts_with('`') {
        StructuredChunk::new(ChunkKind::Code, line.replace('`', ""))
    } else {
        StructuredChunk::new(ChunkKind::Paragraph, line.replace("**", ""))
    }
}

/// `**text**` at the start of the line, with at least one character inside
fn is_heading(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("**") else {
        return false;
    };
    let mut chars = rest.chars();
    chars.next().is_some() && chars.as_str().contains("**")
}

fn strip_bullet(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let marker = chars.next()?;
    if !matches!(marker, '-' | '•' | '*') {
        return None;
    }
    let rest = chars.as_str();
    let after = rest.chars().next()?;
    if after.is_whitespace() {
        Some(&rest[after.len_utf8()..])
    } else {
        None
    }
}

/// Write chunks as plain terminal text
pub fn render_chunks<W: Write>(out: &mut W, chunks: &[StructuredChunk]) -> io::Result<()> {
    for chunk in chunks {
        match chunk.kind {
            ChunkKind::Heading => writeln!(out, "# {}", chunk.text)?,
            ChunkKind::Bullet => writeln!(out, "  • {}", chunk.text)?,
            ChunkKind::Code => writeln!(out, "    {}", chunk.text)?,
            ChunkKind::Paragraph => writeln!(out, "{}", chunk.text)?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub chunks: Vec<StructuredChunk>,
}

/// Transcript of one assistant conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// A conversation seeded with the assistant's greeting
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::Assistant,
                chunks: greeting(),
            }],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_question(&mut self, question: &str) {
        self.messages.push(ChatMessage {
            role: Role::User,
            chunks: vec![StructuredChunk::new(ChunkKind::Paragraph, question.trim())],
        });
    }

    /// Record (or replace, while it is still growing) the latest answer
    pub fn update_answer(&mut self, partial: &str) {
        let chunks = format_response_chunks(partial);
        // The greeting is never overwritten
        let answering = self.messages.len() > 1;
        match self.messages.last_mut() {
            Some(last) if answering && last.role == Role::Assistant => {
                last.chunks = chunks;
            }
            _ => self.messages.push(ChatMessage {
                role: Role::Assistant,
                chunks,
            }),
        }
    }

    pub fn push_error(&mut self) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            chunks: vec![StructuredChunk::new(
                ChunkKind::Paragraph,
                "Something went wrong.",
            )],
        });
    }
}

fn greeting() -> Vec<StructuredChunk> {
    vec![
        StructuredChunk::new(ChunkKind::Heading, "Hi! I'm your ML pipeline assistant."),
        StructuredChunk::new(ChunkKind::Bullet, "I know your EDA, cleaning & transform steps."),
        StructuredChunk::new(ChunkKind::Bullet, "Ask \"How to handle missing values?\""),
        StructuredChunk::new(
            ChunkKind::Bullet,
            "Try \"Model suggestions?\" or \"Tuning tips for RandomForest?\"",
        ),
        StructuredChunk::new(ChunkKind::Paragraph, "Type below to get started."),
    ]
}
