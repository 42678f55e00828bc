//! Terminal presentation surface.
//!
//! Collects the renderer's primitives for one frame, then paints them on
//! a ratatui [`Canvas`] when the frame is presented. The canvas spans
//! the logical surface size in pixels; ratatui scales it to whatever the
//! terminal offers. Surface coordinates grow downwards, canvas
//! coordinates upwards, so every y is flipped.

use std::io::{self, Stdout, stdout};

use crossterm::ExecutableCommand;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use facecast_core::render::{Color, Rect, Surface, TextStyle};
use facecast_core::{FacecastError, VideoFrame};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::style::{Color as TuiColor, Style};
use ratatui::symbols::Marker;
use ratatui::text::Line;
use ratatui::widgets::Block;
use ratatui::widgets::canvas::{Canvas, Rectangle};

#[derive(Debug, Clone)]
enum Shape {
    Rect(Rect, Color),
    Text {
        text: String,
        x: f64,
        y: f64,
        style: TextStyle,
    },
}

/// What has been drawn since the last `clear`.
#[derive(Debug, Default)]
struct Scene {
    video: Option<(u32, u32)>,
    shapes: Vec<Shape>,
}

pub struct TerminalSurface<B: Backend> {
    terminal: Terminal<B>,
    width: u32,
    height: u32,
    scene: Scene,
}

impl TerminalSurface<CrosstermBackend<Stdout>> {
    /// Take over stdout: raw mode plus the alternate screen.
    ///
    /// Pair with [`restore`] before the process exits.
    pub fn stdout(width: u32, height: u32) -> io::Result<Self> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        Ok(Self::new(terminal, width, height))
    }
}

/// Give the terminal back to the shell.
pub fn restore() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

impl<B: Backend> TerminalSurface<B> {
    pub fn new(terminal: Terminal<B>, width: u32, height: u32) -> Self {
        Self {
            terminal,
            width,
            height,
            scene: Scene::default(),
        }
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

fn tui_color(c: Color) -> TuiColor {
    TuiColor::Rgb(c.r, c.g, c.b)
}

impl<B: Backend> Surface for TerminalSurface<B> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.scene = Scene::default();
    }

    fn draw_video(&mut self, frame: &VideoFrame) {
        self.scene.video = Some((frame.width, frame.height));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, _line_width: f64) {
        self.scene.shapes.push(Shape::Rect(rect, color));
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) {
        self.scene.shapes.push(Shape::Text {
            text: text.to_string(),
            x,
            y,
            style,
        });
    }

    fn present(&mut self) -> Result<(), FacecastError> {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        let scene = &self.scene;
        let unit = self.line_height(1.0);

        let title = match scene.video {
            Some((vw, vh)) => format!(" facecast · live {vw}x{vh} · q to quit "),
            None => " facecast · no video · q to quit ".to_string(),
        };

        let canvas = Canvas::default()
            .block(Block::bordered().title(title))
            .marker(Marker::Braille)
            .x_bounds([0.0, w])
            .y_bounds([0.0, h])
            .paint(|ctx| {
                for shape in &scene.shapes {
                    match shape {
                        Shape::Rect(r, color) => ctx.draw(&Rectangle {
                            x: r.x,
                            y: h - r.y - r.height,
                            width: r.width,
                            height: r.height,
                            color: tui_color(*color),
                        }),
                        Shape::Text { text, x, y, style } => {
                            let step = unit * f64::from(style.scale);
                            let fg = Style::default().fg(tui_color(style.fill));
                            for (i, line) in text.lines().enumerate() {
                                let top = y + step * i as f64;
                                if *x > w || top > h {
                                    break;
                                }
                                ctx.print(x.max(0.0), (h - top).clamp(0.0, h), Line::styled(line.to_string(), fg));
                            }
                        }
                    }
                }
            });

        self.terminal
            .draw(|frame| frame.render_widget(canvas, frame.area()))
            .map_err(|e| FacecastError::Render(e.to_string()))?;
        Ok(())
    }
}
