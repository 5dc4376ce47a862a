use std::{fs, path::Path};

use anyhow::{bail, Result};
use libvbf::{Coordinator, HeaderRecord, Job, Progress, RgbaBitmap, Session, VbfFile};
use tracing::{debug, info, instrument};

fn open_session(vbf_file: &Path) -> Result<Session> {
    let session = Session::open(vbf_file, &mut |Progress { current, total }| {
        debug!("unpacked {current}/{total}");
    })?;
    Ok(session)
}

fn follow<T>(coordinator: &mut Coordinator, job: Job<T>, what: &str) -> Result<T> {
    while let Some(Progress { current, total }) = job.next_progress() {
        info!("{what} {current}/{total}");
    }
    Ok(coordinator.wait(job)?)
}

#[instrument]
pub fn list_sections(vbf_file: &Path) -> Result<()> {
    let vbf = VbfFile::open(vbf_file)?;
    println!("VBF version {}", vbf.header().version());
    for (key, value) in vbf.header().fields() {
        println!("  {key} = {value}");
    }
    println!("id\taddress\t\tlength\tcrc");
    for (id, section) in vbf.sections().iter().enumerate() {
        println!(
            "{id}\t{:#010X}\t{}\t{:#06X}",
            section.address(),
            section.data().len(),
            section.checksum()
        );
    }
    Ok(())
}

#[instrument]
pub fn list_pictures(vbf_file: &Path) -> Result<()> {
    let session = open_session(vbf_file)?;
    println!("#\tname\t\tdepth\t\t\tpalette\t{}", HeaderRecord::COLUMNS.join("\t"));
    for (picture, record) in session.pictures().iter().zip(session.records()) {
        let key = picture
            .palette_key()
            .map_or_else(|| "-".to_owned(), |k| format!("{k:#06X}"));
        let values = record.values().map(|v| v.to_string());
        println!(
            "{}\t{}\t{}\t{key}\t{}",
            picture.index(),
            picture.name(),
            picture.kind(),
            values.join("\t")
        );
    }
    for (key, members) in session.palette_groups() {
        if members.len() > 1 {
            println!("pictures {members:?} share palette {key:#06X}");
        }
    }
    Ok(())
}

#[instrument]
pub fn export(vbf_file: &Path, output_dir: &Path, index: Option<usize>) -> Result<()> {
    let session = open_session(vbf_file)?;
    fs::create_dir_all(output_dir)?;
    if let Some(index) = index {
        let picture = session.picture(index)?;
        let path = output_dir.join(picture.export_name());
        session.export_picture(index, &path)?;
        info!("wrote {}", path.display());
        return Ok(());
    }

    let mut coordinator = Coordinator::new(session);
    let dir = output_dir.to_path_buf();
    let job = coordinator.spawn_read(move |session, progress| session.export_all(&dir, progress))?;
    let written = follow(&mut coordinator, job, "exported")?;
    info!("wrote {} pictures to {}", written.len(), output_dir.display());
    Ok(())
}

#[instrument]
pub fn replace(vbf_file: &Path, index: usize, image_file: &Path, output: &Path) -> Result<()> {
    let bitmap = RgbaBitmap::open(image_file)?;
    let session = open_session(vbf_file)?;
    let picture = session.picture(index)?;
    if picture.image().dimensions() != bitmap.dimensions() {
        bail!(
            "{} is {}x{}, but picture {index} ({}) is {}x{}",
            image_file.display(),
            bitmap.width(),
            bitmap.height(),
            picture.name(),
            picture.image().width(),
            picture.image().height()
        );
    }
    let bonded = session.group_of(index)?.len();
    if bonded > 1 {
        info!("picture {index} shares its palette with {} others", bonded - 1);
    }

    let mut coordinator = Coordinator::new(session);
    let output_path = output.to_path_buf();
    let job = coordinator.spawn_mutation(move |session, progress| {
        session.replace_picture(index, &bitmap, progress)?;
        session.save(&output_path)
    })?;
    follow(&mut coordinator, job, "repacked")?;
    info!("saved {}", output.display());
    Ok(())
}
