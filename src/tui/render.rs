use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::input::LineInput;

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub const BG: Color = Color::Rgb(6, 6, 12);
pub const MUTED: Color = Color::Rgb(60, 55, 90);

pub fn spinner_glyph(tick: u32) -> &'static str {
    SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()]
}

// ── Tab bar ───────────────────────────────────────────────────────────────────

pub fn draw_tab_bar(f: &mut Frame, titles: &[String], active: usize, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, title) in titles.iter().enumerate() {
        let style = if i == active {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(format!("[{}] {title}", i + 1), style));
        spans.push(Span::raw("  "));
    }

    f.render_widget(Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)), area);
}

// ── Status bar ────────────────────────────────────────────────────────────────

pub fn draw_status_bar(f: &mut Frame, area: Rect, hints: &str, busy: bool, tick: u32) {
    let (glyph, color) = if busy { (spinner_glyph(tick), Color::Cyan) } else { ("▲", Color::White) };

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(" termiflow", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled("  Tab/Shift+Tab switch · Ctrl+R refresh · Ctrl+C quit", Style::default().fg(Color::DarkGray)),
    ];
    if !hints.is_empty() {
        spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(hints, Style::default().fg(Color::Rgb(100, 180, 220))));
    }

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(10, 10, 18))),
        area,
    );
}

// ── Input line ────────────────────────────────────────────────────────────────

/// Bordered single-line editor with a prompt. While `busy`, the prompt glyph
/// spins and no cursor is placed.
pub fn draw_input(
    f: &mut Frame,
    area: Rect,
    prompt: &str,
    input: &LineInput,
    placeholder: &str,
    busy: bool,
    tick: u32,
) {
    let prompt_text = if busy { format!(" {} {prompt}", spinner_glyph(tick)) } else { format!(" {prompt}") };
    let prompt_span = Span::styled(
        prompt_text.clone(),
        Style::default().fg(if busy { Color::DarkGray } else { Color::Cyan }).add_modifier(Modifier::BOLD),
    );
    let content = if input.value().is_empty() {
        Span::styled(placeholder.to_string(), Style::default().fg(Color::Rgb(70, 70, 90)))
    } else {
        Span::styled(input.value().to_string(), Style::default().fg(Color::White))
    };

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::Rgb(60, 60, 80)))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));
    f.render_widget(Paragraph::new(Line::from(vec![prompt_span, content])).block(block), area);

    if !busy && area.height > 1 {
        let before = &input.value()[..input.cursor().min(input.value().len())];
        let x = area.x + prompt_text.width() as u16 + before.width() as u16;
        if x < area.x + area.width {
            f.set_cursor_position((x, area.y + 1));
        }
    }
}

// ── Scrolling ─────────────────────────────────────────────────────────────────

/// First visible row when showing `height` rows of `total`, `scroll` rows up
/// from the bottom.
pub fn scroll_offset(total: usize, height: u16, scroll: u16) -> u16 {
    let max = total.saturating_sub(height as usize);
    max.saturating_sub(scroll as usize).min(u16::MAX as usize) as u16
}

// ── Wrapping ──────────────────────────────────────────────────────────────────

/// Word wrap for prose. Whitespace runs collapse to one space.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let max_width = max_width.max(1);
    let mut lines = Vec::new();
    for para in text.lines() {
        let mut current = String::new();
        let mut current_width = 0usize;
        for word in para.split_whitespace() {
            let word_width = word.width();
            if current_width == 0 {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + 1 + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += 1 + word_width;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            }
        }
        lines.push(current);
    }
    lines
}

/// Character wrap for verbatim output. Preserves spacing.
pub fn hard_wrap(line: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut width = 0usize;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if width + w > max_width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
            width = 0;
        }
        current.push(c);
        width += w;
    }
    out.push(current);
    out
}

/// Draw `pane` twice on a fresh test terminal, check both frames match, and
/// return the screen as one string per row.
#[cfg(test)]
pub fn draw_twice(pane: &dyn super::pane::Pane, width: u16, height: u16) -> Vec<String> {
    use ratatui::{Terminal, backend::TestBackend};

    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    let mut frame = || {
        terminal
            .draw(|f| {
                let area = f.area();
                pane.render(f, area, 0);
            })
            .unwrap();
        terminal.backend().buffer().clone()
    };
    let first = frame();
    let second = frame();
    assert_eq!(first, second, "same state drew different frames");

    first
        .content()
        .chunks(width as usize)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect()
}
