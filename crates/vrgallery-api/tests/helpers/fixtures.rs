//! Test fixtures: image-like blobs of a chosen size.

use axum_test::multipart::Part;
use bytes::Bytes;

/// JPEG SOI/APP0 header padded to `size` bytes.
pub fn jpeg_bytes(size: usize) -> Bytes {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    data.resize(size.max(data.len()), 0);
    Bytes::from(data)
}

pub fn jpeg_part(file_name: &str, size: usize) -> Part {
    Part::bytes(jpeg_bytes(size))
        .file_name(file_name.to_string())
        .mime_type("image/jpeg")
}

pub fn text_part(file_name: &str) -> Part {
    Part::bytes(Bytes::from_static(b"not an image"))
        .file_name(file_name.to_string())
        .mime_type("text/plain")
}
