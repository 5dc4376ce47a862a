#![allow(dead_code)]

use libvbf::{
    archive::wrap_entry,
    image::{Rgb, PALETTE_LEN},
    EifImage, HeaderRecord, ImageSection, MonochromeImage, MulticolorImage, Palette,
    ResourceItem, ResourceType, RgbaBitmap, Section, Session, SupercolorImage, VbfFile,
    VbfHeader,
};

pub const HEADER: &str = "vbf_version = 2.2;\r\n\r\nheader {\r\n    // Cluster picture data\r\n    description = {\"Picture block\", \"built by tests\"};\r\n    sw_part_number = \"AB12-14C026-AA\";\r\n    sw_part_type = DATA;\r\n    data_format_identifier = 0x10;\r\n    ecu_address = 0x720;\r\n    file_checksum = 0x00000000;\r\n}";

pub const RED: Rgb = [255, 0, 0];
pub const GREEN: Rgb = [0, 255, 0];
pub const BLUE: Rgb = [0, 0, 255];
pub const YELLOW: Rgb = [255, 255, 0];

/// Index of the picture section in [`container`]
pub const PICTURES: usize = libvbf::IMAGE_SECTION_ID;

/// Palette shared by the first two sample pictures
pub fn bonded_palette() -> Palette {
    let mut colors = vec![RED, GREEN, BLUE];
    colors.resize(PALETTE_LEN, [0, 0, 0]);
    Palette::new(colors).unwrap()
}

pub fn multicolor(width: u16, height: u16, palette: Palette, pattern: &[u8]) -> EifImage {
    let indices = (0..usize::from(width) * usize::from(height))
        .map(|i| pattern[i % pattern.len()])
        .collect();
    EifImage::Multicolor(MulticolorImage::new(width, height, palette, indices).unwrap())
}

pub fn bitmap(width: u16, height: u16, pixel: impl Fn(u16, u16) -> [u8; 4]) -> RgbaBitmap {
    let mut pixels = Vec::new();
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&pixel(x, y));
        }
    }
    RgbaBitmap::new(width, height, pixels).unwrap()
}

/// Five pictures: two palette-bonded multicolor images, one multicolor image with a
/// palette of its own, one monochrome and one supercolor image
pub fn sample_pictures() -> Vec<(&'static str, EifImage)> {
    let mut lone = vec![YELLOW, [0, 0, 0]];
    lone.resize(PALETTE_LEN, [9, 9, 9]);
    vec![
        ("needle.eif", multicolor(4, 2, bonded_palette(), &[0, 1])),
        ("gauge.eif", multicolor(4, 2, bonded_palette(), &[0, 2, 2, 0])),
        (
            "warning.eif",
            multicolor(2, 2, Palette::new(lone).unwrap(), &[0, 1, 1]),
        ),
        (
            "logo.eif",
            EifImage::Monochrome(
                MonochromeImage::new(3, 3, (0..9).map(|v| v * 28).collect()).unwrap(),
            ),
        ),
        (
            "photo.eif",
            EifImage::Supercolor(
                SupercolorImage::new(2, 2, (0..16).map(|v| v * 15).collect()).unwrap(),
            ),
        ),
    ]
}

/// A resource table holding `pictures` as zip items, with a raw item in front and a
/// font item at the end
pub fn image_section(pictures: &[(&str, EifImage)]) -> ImageSection {
    let mut records = Vec::new();
    let mut items = vec![ResourceItem::new(ResourceType::Raw, vec![1, 2, 3, 4, 5], 5)];
    for (i, (name, image)) in pictures.iter().enumerate() {
        let encoded = image.encode();
        let x = u16::try_from(i * 40).unwrap();
        records.push(
            HeaderRecord::builder()
                .width(image.width())
                .height(image.height())
                .x(x)
                .y(12)
                .eif_type(u8::from(image.kind()))
                .z(u8::try_from(i).unwrap())
                .intensity(255)
                .palette_id(u8::try_from(i % 2).unwrap())
                .build(),
        );
        items.push(ResourceItem::new(
            ResourceType::Zip,
            wrap_entry(name, &encoded).unwrap(),
            u32::try_from(encoded.len()).unwrap(),
        ));
    }
    items.push(ResourceItem::new(ResourceType::Font, b"FONTDATA".to_vec(), 8));
    ImageSection::new(records, items).unwrap()
}

/// Three blocks, the picture table in the middle one
pub fn container(section: &ImageSection) -> VbfFile {
    let header = VbfHeader::parse(HEADER.to_owned()).unwrap();
    VbfFile::new(
        header,
        vec![
            Section::new(0x0010_0000, (0..64).collect()),
            Section::new(0x0020_0000, section.serialize()),
            Section::new(0x0030_0000, b"calibration".to_vec()),
        ],
    )
    .unwrap()
}

pub fn sample_container() -> VbfFile {
    container(&image_section(&sample_pictures()))
}

pub fn sample_session() -> Session {
    Session::from_container(sample_container(), &mut |_| {}).unwrap()
}
