/// ASCII presentation of rendered frames
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use scroll3d_core::FrameBuffer;
use std::io::Write;

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Pixel rows folded into one character cell. Cells are roughly twice as
/// tall as they are wide, so the frame is rendered at double height.
pub const ROWS_PER_CELL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    ch: char,
    color: Color,
}

const BLANK: Cell = Cell {
    ch: ' ',
    color: Color::Reset,
};

/// Converts RGBA frames to colored terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl AsciiRenderer {
    /// `width` x `height` in character cells
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![BLANK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.cells = vec![BLANK; width * height];
    }

    pub fn clear(&mut self) {
        self.cells.fill(BLANK);
    }

    pub fn char_at(&self, x: usize, y: usize) -> char {
        self.cells[y * self.width + x].ch
    }

    pub fn color_at(&self, x: usize, y: usize) -> Color {
        self.cells[y * self.width + x].color
    }

    /// Fold the frame into cells. Transparent pixels stay blank.
    pub fn rasterize(&mut self, frame: &FrameBuffer) {
        self.clear();
        let width = self.width.min(frame.width());

        for y in 0..self.height {
            for x in 0..width {
                let mut sum = [0u32; 3];
                let mut covered = 0u32;
                for row in y * ROWS_PER_CELL..(y + 1) * ROWS_PER_CELL {
                    if row >= frame.height() {
                        break;
                    }
                    let p = frame.pixel(x, row);
                    if p[3] == 0 {
                        continue;
                    }
                    covered += 1;
                    for c in 0..3 {
                        sum[c] += p[c] as u32;
                    }
                }
                if covered == 0 {
                    continue;
                }

                let rgb = sum.map(|s| (s / covered) as u8);
                self.cells[y * self.width + x] = Cell {
                    ch: ramp_char(luminance(rgb)),
                    color: Color::Rgb {
                        r: rgb[0],
                        g: rgb[1],
                        b: rgb[2],
                    },
                };
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, y as u16))?;
            for x in 0..self.width {
                let cell = self.cells[y * self.width + x];
                writer.queue(SetForegroundColor(cell.color))?;
                writer.queue(Print(cell.ch))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

fn luminance(rgb: [u8; 3]) -> f32 {
    (0.2126 * rgb[0] as f32 + 0.7152 * rgb[1] as f32 + 0.0722 * rgb[2] as f32) / 255.0
}

/// Covered cells never map to a blank, even when unlit
fn ramp_char(luminance: f32) -> char {
    let steps = (LUMINOSITY_RAMP.len() - 2) as f32;
    let index = 1 + (luminance.clamp(0.0, 1.0) * steps).round() as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_frame_is_blank() {
        let mut renderer = AsciiRenderer::new(4, 2);
        renderer.rasterize(&FrameBuffer::new(4, 4));
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(renderer.char_at(x, y), ' ');
            }
        }
    }

    #[test]
    fn test_brightness_maps_to_ramp() {
        let mut frame = FrameBuffer::new(2, 2);
        frame.put_pixel(0, 0, [255, 255, 255, 255]);
        frame.put_pixel(0, 1, [255, 255, 255, 255]);
        frame.put_pixel(1, 1, [0, 0, 0, 255]);

        let mut renderer = AsciiRenderer::new(2, 1);
        renderer.rasterize(&frame);

        assert_eq!(renderer.char_at(0, 0), '@');
        assert_eq!(renderer.char_at(1, 0), '.');
        assert_eq!(
            renderer.color_at(0, 0),
            Color::Rgb {
                r: 255,
                g: 255,
                b: 255
            }
        );
    }

    #[test]
    fn test_two_rows_fold_into_one_cell() {
        let mut frame = FrameBuffer::new(1, 2);
        frame.put_pixel(0, 0, [200, 0, 0, 255]);
        frame.put_pixel(0, 1, [0, 0, 100, 255]);

        let mut renderer = AsciiRenderer::new(1, 1);
        renderer.rasterize(&frame);

        assert_eq!(renderer.color_at(0, 0), Color::Rgb { r: 100, g: 0, b: 50 });
    }

    #[test]
    fn test_draw_writes_every_cell() {
        let mut renderer = AsciiRenderer::new(3, 2);
        let mut frame = FrameBuffer::new(3, 4);
        frame.put_pixel(1, 2, [255, 255, 255, 255]);
        renderer.rasterize(&frame);

        let mut out = Vec::new();
        renderer.draw(&mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.matches('@').count(), 1);
    }
}
