/// Lists the pictures of a VBF file together with their placement records
///
/// cargo run --example list_pictures -- cluster.vbf
use libvbf::{HeaderRecord, Session};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        anyhow::bail!("usage: list_pictures <file.vbf>");
    };
    let session = Session::open(&path, &mut |_| {})?;

    println!("{}", HeaderRecord::COLUMNS.join("\t"));
    for (picture, record) in session.pictures().iter().zip(session.records()) {
        let values = record.values().map(|v| v.to_string());
        println!(
            "{}\t{}\t{}",
            values.join("\t"),
            picture.name(),
            picture.kind()
        );
    }
    for (key, members) in session.palette_groups() {
        println!("palette {key:#06X}: pictures {members:?}");
    }
    Ok(())
}
