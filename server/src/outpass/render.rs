use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("QR generation failed: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

/// Turns an approved outpass payload into a scannable image.
pub trait CodeRenderer: Send + Sync {
    fn render_visual(&self, payload: &str) -> Result<Vec<u8>, RenderError>;

    /// MIME type of the bytes returned by `render_visual`.
    fn mime_type(&self) -> &'static str;

    /// Render and wrap as a `data:` URL that browsers can display directly.
    fn render_data_url(&self, payload: &str) -> Result<String, RenderError> {
        let bytes = self.render_visual(payload)?;
        Ok(format!(
            "data:{};base64,{}",
            self.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }
}

/// QR codes rendered as SVG documents.
#[derive(Debug, Clone)]
pub struct QrSvgRenderer {
    min_dimension: u32,
}

impl QrSvgRenderer {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }
}

impl Default for QrSvgRenderer {
    fn default() -> Self {
        Self::new(256)
    }
}

impl CodeRenderer for QrSvgRenderer {
    fn render_visual(&self, payload: &str) -> Result<Vec<u8>, RenderError> {
        let image = QrCode::new(payload.as_bytes())?
            .render::<svg::Color>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();
        Ok(image.into_bytes())
    }

    fn mime_type(&self) -> &'static str {
        "image/svg+xml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_svg_document() {
        let bytes = QrSvgRenderer::default()
            .render_visual("hitam:outpass:0123456789abcdef")
            .unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn same_payload_renders_identically() {
        let renderer = QrSvgRenderer::default();
        assert_eq!(
            renderer.render_visual("abc").unwrap(),
            renderer.render_visual("abc").unwrap()
        );
    }

    #[test]
    fn data_url_carries_mime_type() {
        let url = QrSvgRenderer::default().render_data_url("abc").unwrap();
        assert!(url.starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn oversized_payload_fails() {
        let payload = "x".repeat(8000);
        assert!(QrSvgRenderer::default().render_visual(&payload).is_err());
    }
}
