use nu_ansi_term::{Color, Style};
use reedline::{
    Highlighter, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    StyledText, ValidationResult, Validator,
};
use std::borrow::Cow;

use crate::tokenizer::{Lexer, TokenKind};

/// Prompt for the interactive session. Continuation lines line up under
/// the `|>` and `->` tails that the validator treats as unfinished input.
#[derive(Clone)]
pub struct REPLPrompt;

const CONTINUATION: &str = "   |> ";

impl Prompt for REPLPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("duet")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, edit_mode: PromptEditMode) -> Cow<str> {
        match edit_mode {
            PromptEditMode::Vi(reedline::PromptViMode::Normal) => Cow::Borrowed(" : "),
            _ => Cow::Borrowed(" > "),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed(CONTINUATION)
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        match history_search.status {
            PromptHistorySearchStatus::Passing => {
                Cow::Owned(format!("history[{}] > ", history_search.term))
            }
            PromptHistorySearchStatus::Failing => {
                Cow::Owned(format!("history[{}] (no match) > ", history_search.term))
            }
        }
    }
}

/// Asks for another line while the input is visibly unfinished.
pub struct REPLValidator;

impl Validator for REPLValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return ValidationResult::Complete;
        }

        if trimmed.ends_with('\\') || trimmed.ends_with("->") || trimmed.ends_with("|>") {
            return ValidationResult::Incomplete;
        }

        let mut delimiters = Vec::new();
        let mut in_string = false;
        let mut escaped = false;

        for c in line.chars() {
            match c {
                '"' if !escaped => in_string = !in_string,
                '\\' if in_string => escaped = !escaped,
                _ if in_string => {
                    escaped = false;
                    continue;
                }

                '{' | '(' | '[' => delimiters.push(c),
                '}' => {
                    if delimiters.pop() != Some('{') {
                        return ValidationResult::Complete;
                    }
                }
                ')' => {
                    if delimiters.pop() != Some('(') {
                        return ValidationResult::Complete;
                    }
                }
                ']' => {
                    if delimiters.pop() != Some('[') {
                        return ValidationResult::Complete;
                    }
                }

                _ => escaped = false,
            }
        }

        if in_string || !delimiters.is_empty() {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Complete
        }
    }
}

pub static KEYWORD_COLOR: Color = Color::LightBlue;
pub static LITERAL_COLOR: Color = Color::Yellow;
pub static DEFAULT_COLOR: Color = Color::White;
pub static OPERATOR_COLOR: Color = Color::DarkGray;
pub static ILLEGAL_COLOR: Color = Color::Red;

fn token_color(kind: TokenKind) -> Color {
    match kind {
        kind if kind.is_keyword() => KEYWORD_COLOR,
        kind if kind.is_literal() => LITERAL_COLOR,
        TokenKind::Identifier => DEFAULT_COLOR,
        TokenKind::Illegal => ILLEGAL_COLOR,
        _ => OPERATOR_COLOR,
    }
}

pub struct SyntaxHighlighter;

impl Highlighter for SyntaxHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();
        let mut position = 0;

        for token in Lexer::new(line) {
            let Some(text) = line.get(token.span.clone()) else {
                break;
            };

            // whitespace between tokens
            if token.span.start > position {
                styled_text.push((
                    Style::new().fg(DEFAULT_COLOR),
                    line[position..token.span.start].to_string(),
                ));
            }

            styled_text.push((Style::new().fg(token_color(token.kind)), text.to_string()));
            position = token.span.end;
        }

        if position < line.len() {
            styled_text.push((Style::new().fg(DEFAULT_COLOR), line[position..].to_string()));
        }

        styled_text
    }
}
