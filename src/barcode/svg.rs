//! Vector rendering of card codes.
//!
//! Produces a standalone SVG document: one rectangle per dark module over
//! a white background, with the literal 13 digit code as a monospace
//! caption below the bars. Blank modules draw nothing, which keeps the
//! documents small.

use super::{encode, PATTERN_LEN};
use crate::error::ServiceResult;

/// Geometry of a rendered vector symbol.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SvgOptions {
    pub module_px: u32,
    pub quiet_modules: u32,
    pub bar_height_px: u32,
    pub caption_height_px: u32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        SvgOptions {
            module_px: 2,
            quiet_modules: 10,
            bar_height_px: 96,
            caption_height_px: 18,
        }
    }
}

impl SvgOptions {
    fn module(&self) -> u32 {
        self.module_px.max(1)
    }

    pub fn width(&self) -> u32 {
        (PATTERN_LEN as u32 + 2 * self.quiet_modules) * self.module()
    }

    pub fn height(&self) -> u32 {
        self.bar_height_px + self.caption_height_px
    }
}

/// Render a card code as an SVG document.
///
/// The code is validated before any output is produced. The caption text
/// is the code itself and therefore pure ASCII digits; any future caption
/// beyond the code would have to be XML escaped here.
pub fn render_svg(code: &str, options: &SvgOptions) -> ServiceResult<String> {
    let pattern = encode(code)?;

    let module = options.module();
    let width = options.width();
    let height = options.height();
    let bar_height = options.bar_height_px;
    let font_size = options.caption_height_px.saturating_sub(4).max(1);
    let baseline = (bar_height + options.caption_height_px).saturating_sub(4);

    let mut bars = String::new();
    for (index, bit) in pattern.iter().enumerate() {
        if bit {
            let x = (options.quiet_modules + index as u32) * module;
            bars.push_str(&format!(
                r##"<rect x="{x}" y="0" width="{module}" height="{bar_height}" fill="#000"/>"##
            ));
        }
    }

    Ok(format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><rect width="{width}" height="{height}" fill="#fff"/>{bars}<text x="{center}" y="{baseline}" font-family="monospace" font-size="{font_size}" text-anchor="middle" fill="#000">{code}</text></svg>"##,
        center = width / 2,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn one_rect_per_dark_module() {
        let code = "4006381333931";
        let svg = render_svg(code, &SvgOptions::default()).unwrap();

        let dark_modules = encode(code).unwrap().iter().filter(|bit| *bit).count();
        // One background rectangle plus one per dark module.
        assert_eq!(svg.matches("<rect").count(), dark_modules + 1);
    }

    #[test]
    fn caption_shows_the_code() {
        let code = "2900000000421";
        let svg = render_svg(code, &SvgOptions::default()).unwrap();
        assert!(svg.contains(">2900000000421</text>"));
        assert!(svg.contains("font-family=\"monospace\""));
    }

    #[test]
    fn document_dimensions_follow_the_options() {
        let options = SvgOptions {
            module_px: 3,
            quiet_modules: 4,
            bar_height_px: 50,
            caption_height_px: 20,
        };
        let svg = render_svg("4006381333931", &options).unwrap();
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.contains(&format!("width=\"{}\"", (95 + 8) * 3)));
        assert!(svg.contains("height=\"70\""));
    }

    #[test]
    fn first_bar_sits_after_the_quiet_zone() {
        let options = SvgOptions::default();
        let svg = render_svg("4006381333931", &options).unwrap();
        let first_bar_x = options.quiet_modules * options.module_px;
        assert!(svg.contains(&format!(r##"<rect x="{first_bar_x}" y="0""##)));
    }

    #[test]
    fn invalid_code_renders_nothing() {
        let result = render_svg("0000000000001", &SvgOptions::default());
        assert!(matches!(result, Err(ServiceError::InvalidCode(_))));
    }
}
