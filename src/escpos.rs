//! ESC/POS command builder for thermal receipt printers.
//!
//! Produces the raw byte stream for a tax invoice: text styling, alignment,
//! fixed-width columns for the item table, feed and cut. Text is printed in
//! the printer's default code page, so anything outside ASCII is
//! transliterated (`₹` becomes `Rs.`) or replaced with `?`.

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Paper roll width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperWidth {
    Mm58,
    Mm80,
}

impl PaperWidth {
    /// Characters per line in the default font.
    pub fn chars(self) -> usize {
        match self {
            PaperWidth::Mm58 => 32,
            PaperWidth::Mm80 => 48,
        }
    }

    pub fn from_mm(mm: u32) -> Self {
        if mm <= 58 {
            PaperWidth::Mm58
        } else {
            PaperWidth::Mm80
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// One fixed-width cell of a table row.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub text: &'a str,
    pub width: usize,
    pub align: Align,
}

impl<'a> Column<'a> {
    pub fn left(text: &'a str, width: usize) -> Self {
        Self {
            text,
            width,
            align: Align::Left,
        }
    }

    pub fn right(text: &'a str, width: usize) -> Self {
        Self {
            text,
            width,
            align: Align::Right,
        }
    }
}

/// Printable form of `s`: ASCII kept, `₹` spelled out, the rest `?`.
pub fn printable(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '₹' => out.push_str("Rs."),
            c if c.is_ascii() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Fit `text` into exactly `width` characters, truncating when too long.
fn pad(text: &str, width: usize, align: Align) -> String {
    let clipped: String = text.chars().take(width).collect();
    match align {
        Align::Left => format!("{clipped:<width$}"),
        Align::Right => format!("{clipped:>width$}"),
    }
}

/// Cells joined by single spaces, each padded or truncated to its width.
pub fn format_columns(cells: &[Column<'_>]) -> String {
    let row = cells
        .iter()
        .map(|c| pad(c.text, c.width, c.align))
        .collect::<Vec<_>>()
        .join(" ");
    row.trim_end().to_string()
}

/// Label on the left, value flush right within `width`. When both do not
/// fit on one line the value moves to a second, right-aligned line.
pub fn format_pair(label: &str, value: &str, width: usize) -> Vec<String> {
    let used = label.chars().count() + value.chars().count();
    if used < width {
        return vec![format!("{label}{}{value}", " ".repeat(width - used))];
    }
    vec![label.to_string(), pad(value, width, Align::Right)]
}

#[derive(Debug)]
pub struct EscPosBuilder {
    buffer: Vec<u8>,
    paper: PaperWidth,
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EscPosBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(512),
            paper: PaperWidth::Mm80,
        }
    }

    pub fn with_paper(mut self, paper: PaperWidth) -> Self {
        self.paper = paper;
        self
    }

    pub fn width(&self) -> usize {
        self.paper.chars()
    }

    // -----------------------------------------------------------------------
    // Printer state
    // -----------------------------------------------------------------------

    /// ESC @: reset printer.
    pub fn init(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    /// ESC E n
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x45, u8::from(on)]);
        self
    }

    /// GS ! n: width and height multipliers, 1 to 8 each.
    pub fn text_size(&mut self, width: u8, height: u8) -> &mut Self {
        let w = width.clamp(1, 8) - 1;
        let h = height.clamp(1, 8) - 1;
        self.buffer.extend_from_slice(&[GS, 0x21, (w << 4) | h]);
        self
    }

    pub fn normal_size(&mut self) -> &mut Self {
        self.text_size(1, 1)
    }

    pub fn double_height(&mut self) -> &mut Self {
        self.text_size(1, 2)
    }

    /// ESC a 0
    pub fn left(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 0]);
        self
    }

    /// ESC a 1
    pub fn center(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 1]);
        self
    }

    // -----------------------------------------------------------------------
    // Text
    // -----------------------------------------------------------------------

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buffer.extend(printable(s).bytes());
        self
    }

    pub fn lf(&mut self) -> &mut Self {
        self.buffer.push(LF);
        self
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s).lf()
    }

    /// Full-width rule of `ch`.
    pub fn rule(&mut self, ch: char) -> &mut Self {
        let rule: String = std::iter::repeat(ch).take(self.width()).collect();
        self.line(&rule)
    }

    pub fn separator(&mut self) -> &mut Self {
        self.rule('-')
    }

    /// See [`format_pair`].
    pub fn line_pair(&mut self, label: &str, value: &str) -> &mut Self {
        for row in format_pair(&printable(label), &printable(value), self.width()) {
            self.line(&row);
        }
        self
    }

    /// One table row, see [`format_columns`].
    pub fn columns(&mut self, cells: &[Column<'_>]) -> &mut Self {
        let texts: Vec<String> = cells.iter().map(|c| printable(c.text)).collect();
        let printable_cells: Vec<Column<'_>> = cells
            .iter()
            .zip(&texts)
            .map(|(c, text)| Column {
                text: text.as_str(),
                ..*c
            })
            .collect();
        let row = format_columns(&printable_cells);
        self.line(&row)
    }

    // -----------------------------------------------------------------------
    // Paper handling
    // -----------------------------------------------------------------------

    /// ESC d n
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x64, lines]);
        self
    }

    /// GS V A 16: partial cut after a 16-dot feed.
    pub fn cut(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[GS, 0x56, 0x41, 0x10]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}
