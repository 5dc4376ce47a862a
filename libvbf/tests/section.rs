mod common;
use common::{image_section, sample_container, sample_pictures, PICTURES};
use libvbf::{
    archive::{unwrap_entry, wrap_entry},
    Boundary, EifImage, EifKind, Error, HeaderRecord, ImageSection, ResourceItem,
    ResourceType,
};

#[test]
fn untouched_section_reserializes_byte_identical() -> anyhow::Result<()> {
    let container = sample_container();
    let bytes = container.section(PICTURES)?;
    let section = ImageSection::parse(bytes)?;
    assert_eq!(section.serialize(), bytes);
    assert_eq!(section.items_count(ResourceType::Zip), 5);
    assert_eq!(section.items_count(ResourceType::Raw), 1);
    assert_eq!(section.items_count(ResourceType::Font), 1);
    assert_eq!(section.records().len(), 5);
    Ok(())
}

#[test]
fn replacing_one_item_keeps_the_others() -> anyhow::Result<()> {
    let section = image_section(&sample_pictures());
    let mut edited = section.clone();

    let replacement = EifImage::decode(&unwrap_entry(section.item_data(ResourceType::Zip, 3)?)?.data)?;
    let encoded = replacement.encode();
    let packed = wrap_entry("logo.eif", &encoded)?;
    edited.replace_item(
        ResourceType::Zip,
        3,
        packed.clone(),
        u32::try_from(encoded.len())?,
        (3, 3),
        u8::from(EifKind::Monochrome),
    )?;

    let reparsed = ImageSection::parse(&edited.serialize())?;
    for index in (0..5).filter(|&i| i != 3) {
        assert_eq!(
            reparsed.item_data(ResourceType::Zip, index)?,
            section.item_data(ResourceType::Zip, index)?
        );
        assert_eq!(reparsed.record(index), section.record(index));
    }
    assert_eq!(reparsed.item_data(ResourceType::Zip, 3)?, packed.as_slice());
    assert_eq!(
        reparsed.item_data(ResourceType::Raw, 0)?,
        section.item_data(ResourceType::Raw, 0)?
    );
    assert_eq!(reparsed.item_data(ResourceType::Font, 0)?, b"FONTDATA");
    Ok(())
}

#[test]
fn replacing_a_picture_updates_its_record() -> anyhow::Result<()> {
    let mut section = image_section(&sample_pictures());
    let before = *section.record(4).unwrap();
    section.replace_item(
        ResourceType::Zip,
        4,
        vec![0; 10],
        10,
        (7, 9),
        u8::from(EifKind::Monochrome),
    )?;
    let after = section.record(4).unwrap();
    assert_eq!((after.width, after.height), (7, 9));
    assert_eq!(after.eif_type, 0x04);
    assert_eq!((after.x, after.y, after.z), (before.x, before.y, before.z));
    assert_eq!(after.palette_id, before.palette_id);
    Ok(())
}

#[test]
fn missing_items_are_out_of_range() {
    let mut section = image_section(&sample_pictures());
    assert!(matches!(
        section.item_data(ResourceType::Zip, 5),
        Err(Error::OutOfRange {
            resource: ResourceType::Zip,
            index: 5,
            count: 5
        })
    ));
    assert!(matches!(
        section.replace_item(ResourceType::Font, 1, vec![], 0, (0, 0), 0),
        Err(Error::OutOfRange { count: 1, .. })
    ));
}

#[test]
fn record_count_must_match_zip_items() -> anyhow::Result<()> {
    let pictures = sample_pictures();
    let section = image_section(&pictures[..4]);
    let mut items = section.items().to_vec();
    items.push(ResourceItem::new(ResourceType::Zip, vec![0; 4], 4));

    let err = ImageSection::new(section.records().to_vec(), items).unwrap_err();
    assert!(matches!(err, Error::Format(ref e) if e.context == Boundary::Section));

    // same mismatch coming from bytes: five zip items, the last record row cut out
    let mut bytes = image_section(&pictures).serialize();
    let counts_len = 8;
    let records_end = counts_len + 5 * HeaderRecord::SIZE;
    bytes.drain(records_end - HeaderRecord::SIZE..records_end);
    bytes[0..4].copy_from_slice(&4u32.to_le_bytes());
    let descriptors = records_end - HeaderRecord::SIZE;
    let item_count = u32::from_le_bytes(bytes[4..8].try_into()?);
    for i in 0..usize::try_from(item_count)? {
        let at = descriptors + i * 16 + 4;
        let offset = u32::from_le_bytes(bytes[at..at + 4].try_into()?);
        let rebased = offset - u32::try_from(HeaderRecord::SIZE)?;
        bytes[at..at + 4].copy_from_slice(&rebased.to_le_bytes());
    }
    let Err(Error::Format(err)) = ImageSection::parse(&bytes) else {
        anyhow::bail!("a section with more zip items than records must not parse");
    };
    assert_eq!(err.context, Boundary::Section);
    assert_eq!(err.reason, "5 zip items but 4 header records");
    Ok(())
}

#[test]
fn record_columns_follow_the_table_order() {
    let record = HeaderRecord::builder()
        .width(320)
        .height(240)
        .x(5)
        .y(6)
        .eif_type(0x07)
        .z(2)
        .intensity(200)
        .r(10)
        .g(20)
        .b(30)
        .palette_id(4)
        .build();
    assert_eq!(HeaderRecord::COLUMNS[0], "Width");
    assert_eq!(HeaderRecord::COLUMNS[10], "Palette");
    assert_eq!(
        record.values(),
        [320, 240, 5, 6, 0x07, 2, 200, 10, 20, 30, 4]
    );
}

#[test]
fn truncated_tables_are_rejected() {
    let bytes = image_section(&sample_pictures()).serialize();
    for len in [0, 6, 40, 200] {
        assert!(
            matches!(ImageSection::parse(&bytes[..len]), Err(Error::Format(_))),
            "{len} bytes parsed"
        );
    }
}
