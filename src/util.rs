//! Small utility helpers used across modules.

use std::path::Path;

/// MIME type for an image path, judged by extension. Defaults to JPEG.
pub fn image_mime_for(path: &Path) -> &'static str {
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => "image/jpeg",
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mime_falls_back_to_jpeg() {
    assert_eq!(image_mime_for(Path::new("a/b/photo.PNG")), "image/png");
    assert_eq!(image_mime_for(Path::new("shot.webp")), "image/webp");
    assert_eq!(image_mime_for(Path::new("upload.tmp")), "image/jpeg");
    assert_eq!(image_mime_for(Path::new("noext")), "image/jpeg");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "àààà";
    let out = trunc_for_log(s, 3);
    assert!(out.starts_with('à'));
    assert!(out.ends_with("(8 bytes total)"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
