mod common;
use common::{bitmap, image_section, sample_pictures, BLUE, GREEN, RED};
use libvbf::{
    archive::unwrap_entry,
    image::{EifHeader, PALETTE_LEN},
    EifImage, EifKind, ResourceType, RgbaBitmap,
};
use mktemp::Temp;

fn many_colors() -> RgbaBitmap {
    bitmap(32, 32, |x, y| {
        let (x, y) = (u8::try_from(x).unwrap(), u8::try_from(y).unwrap());
        [x * 8, y * 8, (x ^ y) * 4, 255]
    })
}

#[test]
fn pictures_survive_packing() -> anyhow::Result<()> {
    let pictures = sample_pictures();
    let section = image_section(&pictures);
    for (index, (name, image)) in pictures.iter().enumerate() {
        let entry = unwrap_entry(section.item_data(ResourceType::Zip, index)?)?;
        assert_eq!(entry.name, *name);
        let decoded = EifImage::decode(&entry.data)?;
        assert_eq!(&decoded, image);
        assert_eq!(decoded.encode(), entry.data);
    }
    Ok(())
}

#[test]
fn bmp_files_round_trip() -> anyhow::Result<()> {
    let dir = Temp::new_dir()?;
    let path = dir.as_path().join("gradient.bmp");
    let original = many_colors();
    original.save_bmp(&path)?;
    assert_eq!(RgbaBitmap::open(&path)?, original);
    Ok(())
}

#[test]
fn few_colors_convert_exactly() -> anyhow::Result<()> {
    let colors = [RED, GREEN, BLUE];
    let original = bitmap(5, 3, |x, y| {
        let [r, g, b] = colors[usize::from(x + y) % 3];
        [r, g, b, 255]
    });
    let image = EifImage::from_rgba(EifKind::Multicolor, &original)?;
    let palette = image.as_multicolor()?.palette();
    assert_eq!(palette.len(), PALETTE_LEN);
    assert_eq!(&palette.colors()[..3], &[BLUE, GREEN, RED]);
    assert!(palette.colors()[3..].iter().all(|&c| c == [0, 0, 0]));

    let decoded = EifImage::decode(&image.encode())?;
    assert_eq!(decoded, image);
    assert_eq!(decoded.to_rgba()?, original);
    Ok(())
}

#[test]
fn many_colors_are_quantized_deterministically() -> anyhow::Result<()> {
    let original = many_colors();
    let first = EifImage::from_rgba(EifKind::Multicolor, &original)?.encode();
    let second = EifImage::from_rgba(EifKind::Multicolor, &original)?.encode();
    assert_eq!(sha256::digest(first.clone()), sha256::digest(second));

    let image = EifImage::decode(&first)?;
    assert!(image.as_multicolor()?.palette().len() <= PALETTE_LEN);
    // every index still points into the palette
    assert_eq!(image.to_rgba()?.dimensions(), (32, 32));
    Ok(())
}

#[test]
fn signature_is_written_back_as_read() -> anyhow::Result<()> {
    let mut bytes = EifImage::from_rgba(EifKind::Supercolor, &many_colors())?.encode();
    bytes[..EifHeader::KIND_OFFSET].copy_from_slice(b"XYZ0123");
    let image = EifImage::decode(&bytes)?;
    assert_eq!(image.signature(), b"XYZ0123");
    assert_eq!(image.encode(), bytes);
    Ok(())
}

#[test]
fn header_builder_defaults_the_signature() {
    let header = EifHeader::builder()
        .kind(EifKind::Monochrome)
        .data_len(6)
        .width(3)
        .height(2)
        .build();
    assert_eq!(header.signature, libvbf::image::DEFAULT_SIGNATURE);
    assert_eq!(header.pixel_count(), 6);
}
