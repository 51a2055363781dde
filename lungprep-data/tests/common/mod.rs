//! Fixture corpora and run roots shared by the integration tests.

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use lungprep_core::AppConfig;
use std::io::{Cursor, Write};
use std::path::Path;

pub const SCHEMA_YAML: &str = r#"columns: [Label_Image_Path, Image_Label]
column_datatypes:
  Label_Image_Path: object
  Image_Label: object
domain_value:
  Image_Label: [NORMAL, PNEUMONIA]
"#;

/// `(partition, label, images)` triples.
pub type Layout<'a> = &'a [(&'a str, &'a str, usize)];

/// Train 100/50, test 25/25, val 10/10 (NORMAL/PNEUMONIA).
pub const STANDARD_LAYOUT: Layout<'static> = &[
    ("train", "NORMAL", 100),
    ("train", "PNEUMONIA", 50),
    ("test", "NORMAL", 25),
    ("test", "PNEUMONIA", 25),
    ("val", "NORMAL", 10),
    ("val", "PNEUMONIA", 10),
];

fn jpeg_bytes(shade: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(8, 8, |x, y| Rgb([shade, (x * 16) as u8, (y * 16) as u8]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

/// Zip archive bytes with `chest_xray/<partition>/<label>/<n>.jpeg` entries.
pub fn corpus_zip(layout: Layout<'_>) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (partition, label, count) in layout {
        let shade = if *label == "NORMAL" { 220 } else { 40 };
        let image = jpeg_bytes(shade);
        for i in 0..*count {
            let name = format!("chest_xray/{partition}/{label}/{label}_{i:04}.jpeg");
            zip.start_file(name, options).unwrap();
            zip.write_all(&image).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

/// Write the archive under `dir` and return its path.
pub fn write_corpus(dir: &Path, layout: Layout<'_>) -> std::path::PathBuf {
    let path = dir.join("chest_xray.zip");
    std::fs::write(&path, corpus_zip(layout)).unwrap();
    path
}

/// Prepare `root/config/schema.yaml` and a config pointing at `source_url`
/// with small images so the runs stay quick.
pub fn setup_root(root: &Path, source_url: &str) -> AppConfig {
    std::fs::create_dir_all(root.join("config")).unwrap();
    std::fs::write(root.join("config").join("schema.yaml"), SCHEMA_YAML).unwrap();

    let mut config = AppConfig::default();
    config.data_ingestion.data_source_url = source_url.to_string();
    config.generator.image_size = 16;
    config.generator.batch_size = 8;
    config.generator.seed = Some(17);
    config
}

pub fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path).unwrap().to_string()
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
