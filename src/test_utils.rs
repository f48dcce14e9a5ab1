//! Helpers shared by unit and integration tests.
//!
//! Tests build their PDFs on the fly instead of shipping binary fixtures.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// US Letter in PDF points
pub const LETTER: (u32, u32) = (612, 792);

/// Build a minimal, valid PDF with one page per entry in `pages`.
///
/// Each page shows its text in Helvetica, one PDF text line per `\n`.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    pdf_bytes_with_size(pages, LETTER)
}

/// Same as [`pdf_bytes`] with an explicit media box size in points.
pub fn pdf_bytes_with_size(pages: &[&str], size: (u32, u32)) -> Vec<u8> {
    let (width, height) = size;
    let font_id = 3;
    let first_page_id = 4;

    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", first_page_id + i * 2))
        .collect();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (i, text) in pages.iter().enumerate() {
        let contents_id = first_page_id + i * 2 + 1;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] \
             /Resources << /Font << /F1 {font_id} 0 R >> >> /Contents {contents_id} 0 R >>"
        ));

        let mut stream = format!("BT /F1 12 Tf 14 TL 72 {} Td", height.saturating_sub(72));
        for line in text.lines() {
            let _ = write!(stream, " ({}) Tj T*", escape_pdf_string(line));
        }
        stream.push_str(" ET");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", i + 1);
    }

    let xref_offset = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    );

    out.into_bytes()
}

/// Write a generated PDF to `path`, creating parent directories.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    write_pdf_with_size(path, pages, LETTER);
}

pub fn write_pdf_with_size(path: &Path, pages: &[&str], size: (u32, u32)) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, pdf_bytes_with_size(pages, size)).unwrap();
}

fn escape_pdf_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => escaped.push(c),
            _ => escaped.push('?'),
        }
    }
    escaped
}
