//! ANSI/VT escape sequence handling on top of the VTE state machine.

use std::collections::HashMap;

use tracing::trace;
use vte::{Params, Perform};

use termpilot_core::{CellAttributes, Color, Dimensions};

use crate::grid::Grid;

/// Handler for an out-of-band (OSC) sequence.
///
/// Receives the payload after the numeric code, with the original `;`
/// separators, and returns whether it handled the payload.
pub type OobHandler = Box<dyn FnMut(&str) -> bool + Send>;

/// Terminal state driven by parsed sequences: a primary screen with
/// scrollback, an optional alternate screen, and OSC handlers.
pub struct Terminal {
    primary: Grid,
    alternate: Option<Grid>,
    oob_handlers: HashMap<u16, Vec<OobHandler>>,
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("primary", &self.primary)
            .field("alternate", &self.alternate)
            .field("oob_codes", &self.oob_handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Terminal {
    /// Create a terminal with a blank primary screen.
    pub fn new(dimensions: Dimensions, scrollback: usize) -> Self {
        Self {
            primary: Grid::new(dimensions, scrollback),
            alternate: None,
            oob_handlers: HashMap::new(),
        }
    }

    /// Screen currently receiving output.
    pub fn active(&self) -> &Grid {
        self.alternate.as_ref().unwrap_or(&self.primary)
    }

    fn active_mut(&mut self) -> &mut Grid {
        self.alternate.as_mut().unwrap_or(&mut self.primary)
    }

    /// Whether the alternate screen is active.
    pub fn is_alternate_screen(&self) -> bool {
        self.alternate.is_some()
    }

    /// Resize both screens.
    pub fn resize(&mut self, dimensions: Dimensions) {
        self.primary.resize(dimensions);
        if let Some(alternate) = self.alternate.as_mut() {
            alternate.resize(dimensions);
        }
    }

    /// Register a handler for OSC sequences carrying `code`.
    pub fn register_oob_handler(&mut self, code: u16, handler: OobHandler) {
        self.oob_handlers.entry(code).or_default().push(handler);
    }

    /// Drop every registered OSC handler.
    pub fn clear_oob_handlers(&mut self) {
        self.oob_handlers.clear();
    }

    fn enter_alternate_screen(&mut self) {
        if self.alternate.is_some() {
            return;
        }
        let mut alternate = Grid::new(self.primary.dimensions(), 0);
        let cursor = *self.primary.cursor();
        alternate.move_cursor_to(cursor.row, cursor.col);
        alternate.set_current_attrs(*self.primary.current_attrs());
        alternate.set_current_fg(self.primary.current_fg());
        alternate.set_current_bg(self.primary.current_bg());
        self.alternate = Some(alternate);
    }

    fn leave_alternate_screen(&mut self) {
        self.alternate = None;
    }

    fn set_private_mode(&mut self, mode: u16, enabled: bool) {
        match mode {
            25 => self.active_mut().cursor_mut().visible = enabled,
            47 | 1047 => {
                if enabled {
                    self.enter_alternate_screen();
                } else {
                    self.leave_alternate_screen();
                }
            }
            1049 => {
                if enabled {
                    self.primary.save_cursor();
                    self.enter_alternate_screen();
                } else {
                    self.leave_alternate_screen();
                    self.primary.restore_cursor();
                }
            }
            _ => trace!("Ignoring private mode: {}={}", mode, enabled),
        }
    }

    fn reset(&mut self) {
        self.alternate = None;
        self.primary.reset_pen();
        self.primary.erase_in_display(3);
        self.primary.move_cursor_to(0, 0);
    }
}

/// First value of parameter `index`, or `default` when missing or zero.
fn arg(params: &Params, index: usize, default: u16) -> u16 {
    params
        .iter()
        .nth(index)
        .and_then(|p| p.first().copied())
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

/// First value of the first parameter, zero allowed.
fn mode(params: &Params) -> u16 {
    params
        .iter()
        .next()
        .and_then(|p| p.first().copied())
        .unwrap_or(0)
}

/// Parse an extended color (`5;n` or `2;r;g;b`) from a value stream.
fn extended_color(values: &mut impl Iterator<Item = u16>) -> Option<Color> {
    match values.next()? {
        5 => Some(Color::Indexed(values.next()? as u8)),
        2 => {
            let r = values.next()? as u8;
            let g = values.next()? as u8;
            let b = values.next()? as u8;
            Some(Color::Rgb { r, g, b })
        }
        _ => None,
    }
}

fn apply_sgr(grid: &mut Grid, params: &Params) {
    let mut iter = params.iter();
    while let Some(param) = iter.next() {
        let code = param.first().copied().unwrap_or(0);
        let mut attrs: CellAttributes = *grid.current_attrs();

        match code {
            0 => {
                grid.reset_pen();
                continue;
            }
            1 => attrs.bold = true,
            2 => attrs.dim = true,
            3 => attrs.italic = true,
            4 => attrs.underline = true,
            5 => attrs.blink = true,
            7 => attrs.reverse = true,
            8 => attrs.hidden = true,
            9 => attrs.strikethrough = true,
            22 => {
                attrs.bold = false;
                attrs.dim = false;
            }
            23 => attrs.italic = false,
            24 => attrs.underline = false,
            25 => attrs.blink = false,
            27 => attrs.reverse = false,
            28 => attrs.hidden = false,
            29 => attrs.strikethrough = false,
            30..=37 => grid.set_current_fg(Color::Ansi((code - 30) as u8)),
            39 => grid.set_current_fg(Color::Default),
            40..=47 => grid.set_current_bg(Color::Ansi((code - 40) as u8)),
            49 => grid.set_current_bg(Color::Default),
            90..=97 => grid.set_current_fg(Color::Ansi((code - 90 + 8) as u8)),
            100..=107 => grid.set_current_bg(Color::Ansi((code - 100 + 8) as u8)),
            38 | 48 => {
                // Colon form carries the color in subparams; semicolon form
                // spreads it over the following params.
                let color = if param.len() > 1 {
                    extended_color(&mut param[1..].iter().copied())
                } else {
                    extended_color(&mut (&mut iter).map(|p| p.first().copied().unwrap_or(0)))
                };
                if let Some(color) = color {
                    if code == 38 {
                        grid.set_current_fg(color);
                    } else {
                        grid.set_current_bg(color);
                    }
                }
            }
            _ => {}
        }

        grid.set_current_attrs(attrs);
    }
}

impl Perform for Terminal {
    fn print(&mut self, c: char) {
        self.active_mut().put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        let grid = self.active_mut();
        match byte {
            // Backspace (BS)
            0x08 => grid.move_cursor_by(0, -1),
            // Horizontal Tab (HT)
            0x09 => grid.tab(),
            // LF, VT, FF
            0x0A..=0x0C => grid.line_feed(),
            // Carriage Return (CR)
            0x0D => grid.carriage_return(),
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(code) = params
            .first()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(|s| s.parse::<u16>().ok())
        else {
            return;
        };

        let Some(handlers) = self.oob_handlers.get_mut(&code) else {
            return;
        };

        let payload = params[1..]
            .iter()
            .map(|p| String::from_utf8_lossy(p))
            .collect::<Vec<_>>()
            .join(";");

        for handler in handlers.iter_mut().rev() {
            if handler(&payload) {
                break;
            }
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, c: char) {
        if ignore {
            return;
        }
        let private = intermediates.first() == Some(&b'?');

        if private {
            if matches!(c, 'h' | 'l') {
                for param in params.iter() {
                    if let Some(&mode) = param.first() {
                        self.set_private_mode(mode, c == 'h');
                    }
                }
            }
            return;
        }

        let grid = self.active_mut();
        match c {
            // Cursor Up (CUU)
            'A' => grid.move_cursor_by(-i32::from(arg(params, 0, 1)), 0),
            // Cursor Down (CUD, VPR)
            'B' | 'e' => grid.move_cursor_by(i32::from(arg(params, 0, 1)), 0),
            // Cursor Forward (CUF, HPR)
            'C' | 'a' => grid.move_cursor_by(0, i32::from(arg(params, 0, 1))),
            // Cursor Backward (CUB)
            'D' => grid.move_cursor_by(0, -i32::from(arg(params, 0, 1))),
            // Cursor Next Line (CNL)
            'E' => {
                grid.move_cursor_by(i32::from(arg(params, 0, 1)), 0);
                grid.carriage_return();
            }
            // Cursor Previous Line (CPL)
            'F' => {
                grid.move_cursor_by(-i32::from(arg(params, 0, 1)), 0);
                grid.carriage_return();
            }
            // Cursor Horizontal Absolute (CHA, HPA)
            'G' | '`' => {
                let row = grid.cursor().row;
                grid.move_cursor_to(row, arg(params, 0, 1) - 1);
            }
            // Cursor Position (CUP, HVP)
            'H' | 'f' => grid.move_cursor_to(arg(params, 0, 1) - 1, arg(params, 1, 1) - 1),
            // Vertical Position Absolute (VPA)
            'd' => {
                let col = grid.cursor().col;
                grid.move_cursor_to(arg(params, 0, 1) - 1, col);
            }
            // Erase in Display (ED)
            'J' => grid.erase_in_display(mode(params)),
            // Erase in Line (EL)
            'K' => grid.erase_in_line(mode(params)),
            // Insert Lines (IL)
            'L' => grid.insert_lines(arg(params, 0, 1)),
            // Delete Lines (DL)
            'M' => grid.delete_lines(arg(params, 0, 1)),
            // Insert Characters (ICH)
            '@' => grid.insert_chars(arg(params, 0, 1)),
            // Delete Characters (DCH)
            'P' => grid.delete_chars(arg(params, 0, 1)),
            // Erase Characters (ECH)
            'X' => grid.erase_chars(arg(params, 0, 1)),
            // Scroll Up (SU)
            'S' => grid.scroll_up(arg(params, 0, 1)),
            // SGR (Select Graphic Rendition)
            'm' => apply_sgr(grid, params),
            // Save / Restore Cursor Position
            's' => grid.save_cursor(),
            'u' => grid.restore_cursor(),
            _ => trace!("Ignoring CSI sequence: {:?} {}", intermediates, c),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        // Charset designations and the like carry intermediates
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'7' => self.active_mut().save_cursor(),
            b'8' => self.active_mut().restore_cursor(),
            b'D' => self.active_mut().line_feed(),
            b'E' => {
                let grid = self.active_mut();
                grid.carriage_return();
                grid.line_feed();
            }
            b'M' => self.active_mut().reverse_index(),
            b'c' => self.reset(),
            _ => {}
        }
    }
}

/// VTE state machine paired with the terminal state it drives.
///
/// The state machine persists across [`Parser::process`] calls, so a
/// sequence split over two chunks is still recognized.
pub struct Parser {
    machine: vte::Parser,
    terminal: Terminal,
}

impl Parser {
    /// Create a parser over a blank terminal.
    pub fn new(dimensions: Dimensions, scrollback: usize) -> Self {
        Self {
            machine: vte::Parser::new(),
            terminal: Terminal::new(dimensions, scrollback),
        }
    }

    /// Terminal state.
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Mutable terminal state.
    pub fn terminal_mut(&mut self) -> &mut Terminal {
        &mut self.terminal
    }

    /// Feed bytes through the state machine.
    pub fn process(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.machine.advance(&mut self.terminal, *byte);
        }
    }
}
