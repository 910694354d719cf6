const CSI: &str = "\x1b[";
const CLEAR_LINE: &str = "\x1b[2K";
const CLEAR_BELOW: &str = "\x1b[0J";
const RESET: &str = "\x1b[0m";
const TAB_STOP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Visible terminal dimensions in character cells.
pub struct TerminalSize {
    pub columns: usize,
    pub rows: usize,
}

impl TerminalSize {
    pub const FALLBACK: Self = Self {
        columns: 80,
        rows: 24,
    };

    /// Size of the controlling terminal, or [`Self::FALLBACK`] when unknown.
    pub fn detect() -> Self {
        match crossterm::terminal::size() {
            Ok((columns, rows)) if columns > 0 && rows > 0 => Self {
                columns: usize::from(columns),
                rows: usize::from(rows),
            },
            _ => Self::FALLBACK,
        }
    }
}

/// Region of the terminal redrawn in place on every live frame.
///
/// Every drawn line occupies exactly one screen row: lines are clipped to
/// the terminal width and a frame keeps only as many trailing lines as fit
/// above the cursor, so rewinding by the line count always lands on the
/// first row of the previous frame.
#[derive(Debug, Default, Clone)]
pub struct LiveArea {
    previous: Vec<String>,
    size: Option<TerminalSize>,
}

impl LiveArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `size` instead of querying the terminal before each frame.
    pub fn with_size(size: TerminalSize) -> Self {
        Self {
            previous: Vec::new(),
            size: Some(size),
        }
    }

    /// Escape sequence that moves over the previous frame and draws `next`.
    ///
    /// Unchanged lines are skipped; a shorter frame clears what is left below.
    pub fn redraw(&mut self, next: Vec<String>) -> String {
        let next = fit_to_terminal(next, self.size.unwrap_or_else(TerminalSize::detect));
        let mut output = self.rewind();
        for (index, line) in next.iter().enumerate() {
            if self.previous.get(index) == Some(line) {
                output.push_str(CSI);
                output.push_str("1B");
                continue;
            }
            output.push_str(CLEAR_LINE);
            output.push_str(line);
            output.push('\n');
        }
        if next.len() < self.previous.len() {
            output.push_str(CLEAR_BELOW);
        }
        self.previous = next;
        output
    }

    /// Escape sequence that erases the live area entirely.
    pub fn clear(&mut self) -> String {
        if self.previous.is_empty() {
            return String::new();
        }
        let mut output = self.rewind();
        output.push_str(CLEAR_BELOW);
        self.previous.clear();
        output
    }

    pub fn snapshot(&self) -> &[String] {
        &self.previous
    }

    fn rewind(&self) -> String {
        match self.previous.len() {
            0 => "\r".to_string(),
            lines => format!("\r{CSI}{lines}A"),
        }
    }
}

/// Keeps the trailing lines that fit on screen, one row each.
///
/// One row stays free for the cursor after the final newline.
fn fit_to_terminal(lines: Vec<String>, size: TerminalSize) -> Vec<String> {
    let max_lines = size.rows.saturating_sub(1).max(1);
    let skip = lines.len().saturating_sub(max_lines);
    lines
        .into_iter()
        .skip(skip)
        .map(|line| clip_to_width(&line, size.columns.max(1)))
        .collect()
}

/// Cuts `line` after `width` visible cells. Escape sequences take no space.
fn clip_to_width(line: &str, width: usize) -> String {
    let mut clipped = String::with_capacity(line.len());
    let mut visible = 0;
    let mut styled = false;
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => {
                styled = true;
                clipped.push(ch);
                for next in chars.by_ref() {
                    clipped.push(next);
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            '\t' => {
                let stop = (visible / TAB_STOP + 1) * TAB_STOP;
                let spaces = stop.min(width) - visible;
                clipped.extend(std::iter::repeat(' ').take(spaces));
                visible += spaces;
                if visible >= width {
                    break;
                }
            }
            _ if ch.is_control() => {}
            _ => {
                if visible >= width {
                    break;
                }
                clipped.push(ch);
                visible += 1;
            }
        }
    }
    if styled && visible >= width {
        clipped.push_str(RESET);
    }
    clipped
}
