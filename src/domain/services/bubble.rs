#[cfg(test)]
#[path = "bubble_test.rs"]
mod tests;

use chrono::Local;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::text::Span;

use crate::domain::models::Author;
use crate::domain::models::ChatMessage;
use crate::domain::models::DeliveryState;

// Left border + left padding + right padding + right border + scrollbar.
const BORDER_ELEMENTS_LENGTH: usize = 5;
const OUTER_PADDING_PERCENTAGE: f32 = 0.04;

#[derive(PartialEq, Eq)]
pub enum BubbleAlignment {
    Left,
    Right,
}

pub struct Bubble<'a> {
    alignment: BubbleAlignment,
    message: &'a ChatMessage,
    window_max_width: usize,
}

fn repeat_from_subtractions(text: &str, subtractions: Vec<usize>) -> String {
    let count = subtractions
        .into_iter()
        .reduce(|a, b| return a.saturating_sub(b))
        .unwrap_or_default();

    return [text].repeat(count).join("");
}

fn split_oversize(word: &str, line_max_width: usize) -> Vec<String> {
    if word.chars().count() <= line_max_width {
        return vec![word.to_string()];
    }

    let chars = word.chars().collect::<Vec<char>>();
    return chars
        .chunks(line_max_width)
        .map(|e| return e.iter().collect::<String>())
        .collect();
}

fn wrap_text(text: &str, line_max_width: usize) -> Vec<String> {
    let mut lines: Vec<String> = vec![];

    for full_line in text.split('\n') {
        if full_line.trim().is_empty() {
            lines.push(" ".to_string());
            continue;
        }

        let mut char_count = 0;
        let mut current_words: Vec<String> = vec![];

        for word in full_line
            .split(' ')
            .flat_map(|e| return split_oversize(e, line_max_width))
        {
            let word_len = word.chars().count();
            if char_count + word_len > line_max_width && !current_words.is_empty() {
                lines.push(current_words.join(" ").trim_end().to_string());
                current_words = vec![];
                char_count = 0;
            }

            char_count += word_len + 1;
            current_words.push(word);
        }

        if !current_words.is_empty() {
            lines.push(current_words.join(" ").trim_end().to_string());
        }
    }

    return lines;
}

impl<'a> Bubble<'_> {
    pub fn new(
        message: &'a ChatMessage,
        alignment: BubbleAlignment,
        window_max_width: usize,
    ) -> Bubble {
        return Bubble {
            alignment,
            message,
            window_max_width,
        };
    }

    pub fn as_lines(&self) -> Vec<Line<'static>> {
        let max_line_length = self.get_max_line_length();

        let mut lines: Vec<Line> = vec![];
        for text_line in wrap_text(&self.message.content, max_line_length) {
            lines.push(self.spans_to_line(&text_line, max_line_length));
        }

        return self.wrap_lines_in_bubble(lines, max_line_length);
    }

    /// Author, send time, and the delivery state when it isn't the happy
    /// path. Rendered into the bubble's top border.
    fn header(&self) -> String {
        let author = self.message.author.to_string();
        let time = self.message.timestamp.with_timezone(&Local).format("%H:%M");
        let mut header = format!("{author} {time}");

        match self.message.delivery {
            DeliveryState::Pending => header += " (sending)",
            DeliveryState::Failed => header += " (failed)",
            DeliveryState::Delivered => {}
        }

        return header;
    }

    fn bubble_style(&self) -> Style {
        match self.message.delivery {
            DeliveryState::Pending => {
                return Style {
                    fg: Some(Color::DarkGray),
                    ..Style::default()
                };
            }
            DeliveryState::Failed => {
                return Style {
                    fg: Some(Color::Red),
                    ..Style::default()
                };
            }
            DeliveryState::Delivered => {}
        }

        if self.message.author == Author::User {
            return Style {
                fg: Some(Color::Green),
                ..Style::default()
            };
        }

        return Style {
            fg: Some(Color::Cyan),
            ..Style::default()
        };
    }

    fn content_style(&self) -> Style {
        if self.message.delivery == DeliveryState::Delivered {
            return Style::default();
        }

        return self.bubble_style();
    }

    fn spans_to_line(&self, text_line: &str, max_line_length: usize) -> Line<'static> {
        let fill = repeat_from_subtractions(" ", vec![max_line_length, text_line.chars().count()]);
        let bubble_width = max_line_length + 4;

        let mut spans = vec![
            Span::styled("│ ".to_string(), self.bubble_style()),
            Span::styled(format!("{text_line}{fill}"), self.content_style()),
            Span::styled(" │".to_string(), self.bubble_style()),
        ];

        let outer_padding = repeat_from_subtractions(
            " ",
            vec![self.window_max_width, bubble_width, 1],
        );

        if self.alignment == BubbleAlignment::Left {
            spans.push(Span::from(outer_padding));
            return Line::from(spans);
        }

        let mut line_spans = vec![Span::from(outer_padding)];
        line_spans.append(&mut spans);

        return Line::from(line_spans);
    }

    fn get_max_line_length(&self) -> usize {
        // Keep a minimum of 4% of the window open on the bubble's loose side.
        let min_outer_padding =
            ((self.window_max_width as f32 * OUTER_PADDING_PERCENTAGE).ceil()) as usize;
        let line_border_width = BORDER_ELEMENTS_LENGTH + min_outer_padding;

        let mut max_line_length = self
            .message
            .content
            .lines()
            .map(|line| return line.chars().count())
            .max()
            .unwrap_or_default();

        let cap = self.window_max_width.saturating_sub(line_border_width);
        if max_line_length > cap {
            max_line_length = cap;
        }

        let header_length = self.header().chars().count();
        if max_line_length < header_length {
            max_line_length = header_length;
        }

        return max_line_length;
    }

    fn wrap_lines_in_bubble(
        &self,
        lines: Vec<Line<'static>>,
        max_line_length: usize,
    ) -> Vec<Line<'static>> {
        let inner_bar = ["─"].repeat(max_line_length + 2).join("");
        let mut top_bar = format!("╭{inner_bar}╮");
        let bottom_bar = format!("╰{inner_bar}╯");

        let header = self.header();
        let header_replace = ["─"].repeat(header.chars().count()).join("");
        top_bar = top_bar.replace(
            format!("╭{header_replace}").as_str(),
            format!("╭{header}").as_str(),
        );

        let outer_padding =
            repeat_from_subtractions(" ", vec![self.window_max_width, max_line_length + 4, 1]);

        if self.alignment == BubbleAlignment::Left {
            let mut res = vec![self.bar_line(format!("{top_bar}{outer_padding}"))];
            res.extend(lines);
            res.push(self.bar_line(format!("{bottom_bar}{outer_padding}")));
            return res;
        }

        let mut res = vec![self.bar_line(format!("{outer_padding}{top_bar}"))];
        res.extend(lines);
        res.push(self.bar_line(format!("{outer_padding}{bottom_bar}")));
        return res;
    }

    fn bar_line(&self, text: String) -> Line<'static> {
        return Line::from(Span::styled(text, self.bubble_style()));
    }
}
