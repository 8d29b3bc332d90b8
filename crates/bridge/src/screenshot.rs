//! Viewport and stitched full-page screenshots.
//!
//! Full-page capture walks the document in viewport-height steps, pastes
//! each slice into one canvas at device-pixel resolution, restores the
//! original scroll offset, and returns a single base64 PNG data URL.

use std::io::Cursor;

use {
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    image::{ImageFormat, RgbaImage},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    host::HostBrowser,
};

pub(crate) async fn viewport(host: &dyn HostBrowser, tab_id: i64) -> Result<String> {
    let capture = host.capture_visible(tab_id).await?;
    encode_data_url(&capture)
}

pub(crate) async fn full_page(host: &dyn HostBrowser, tab_id: i64) -> Result<String> {
    let page = host.page(tab_id).await?;

    // Record geometry and the offset to restore.
    let (original_y, viewport_h, doc_h, dpr) = {
        let page = page.lock().await;
        (
            page.scroll_y,
            page.viewport_height,
            page.document_height(),
            page.device_pixel_ratio,
        )
    };

    let canvas_h = (doc_h * dpr).round() as u32;
    let slices = (doc_h / viewport_h).ceil() as u32;
    debug!(slices, doc_h, "stitching full-page screenshot");

    let mut canvas: Option<RgbaImage> = None;
    for i in 0..slices {
        // Clamp the last step so the slice stays inside the document.
        let target_y = (i as f64 * viewport_h).min(doc_h - viewport_h).max(0.0);
        {
            let mut page = page.lock().await;
            let delta = target_y - page.scroll_y;
            page.scroll_window_by(0.0, delta);
        }
        let slice = host.capture_visible(tab_id).await?;
        let canvas = canvas.get_or_insert_with(|| {
            RgbaImage::new(slice.width(), canvas_h.max(slice.height()))
        });
        let offset_y = (target_y * dpr).round() as u32;
        paste(canvas, &slice, offset_y);
    }

    // Restore where the user was.
    {
        let mut page = page.lock().await;
        let delta = original_y - page.scroll_y;
        page.scroll_window_by(0.0, delta);
    }

    let canvas = canvas.ok_or_else(|| Error::Screenshot("no slices captured".into()))?;
    encode_data_url(&canvas)
}

fn paste(canvas: &mut RgbaImage, slice: &RgbaImage, offset_y: u32) {
    for (x, y, pixel) in slice.enumerate_pixels() {
        let target_y = offset_y + y;
        if x < canvas.width() && target_y < canvas.height() {
            canvas.put_pixel(x, target_y, *pixel);
        }
    }
}

fn encode_data_url(image: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::Screenshot(e.to_string()))?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(bytes)))
}

/// Decode a data URL back to an image; the test suites verify stitched
/// dimensions with this.
pub fn decode_data_url(data_url: &str) -> Result<RgbaImage> {
    let b64 = data_url
        .split_once(',')
        .map(|(_, b)| b)
        .ok_or_else(|| Error::Screenshot("not a data URL".into()))?;
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| Error::Screenshot(e.to_string()))?;
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| Error::Screenshot(e.to_string()))?;
    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessBrowser;

    #[tokio::test]
    async fn viewport_screenshot_is_a_png_data_url() {
        let host = HeadlessBrowser::new();
        let tab = host.create_tab("http://127.0.0.1:3456/fixtures.html").await.unwrap();
        let data_url = viewport(host.as_ref(), tab.id).await.unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&data_url).unwrap();
        assert_eq!(decoded.width(), 1280);
        assert_eq!(decoded.height(), 720);
    }

    #[tokio::test]
    async fn full_page_stitches_to_document_height_and_restores_scroll() {
        let host = HeadlessBrowser::new();
        let tab = host.create_tab("http://127.0.0.1:3456/fixtures.html").await.unwrap();
        let page = host.page(tab.id).await.unwrap();
        {
            // Fixture document is three viewports tall; start mid-scroll.
            let mut page = page.lock().await;
            page.scroll_window_by(0.0, 333.0);
        }

        let data_url = full_page(host.as_ref(), tab.id).await.unwrap();
        let decoded = decode_data_url(&data_url).unwrap();
        assert_eq!(decoded.width(), 1280);
        assert_eq!(decoded.height(), 2160);

        // Slices came from different scroll offsets.
        let top = *decoded.get_pixel(10, 10);
        let bottom = *decoded.get_pixel(10, 2100);
        assert_ne!(top, bottom);

        assert_eq!(page.lock().await.scroll_y, 333.0);
    }
}
