/// Replaces one picture of a VBF file with a BMP file, reporting progress from a worker thread
///
/// cargo run --example patch_picture -- cluster.vbf 3 needle.bmp patched.vbf
use libvbf::{Coordinator, RgbaBitmap, Session};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let args = std::env::args_os().skip(1).collect::<Vec<_>>();
    let [vbf, index, bmp, output] = args.as_slice() else {
        anyhow::bail!("usage: patch_picture <file.vbf> <index> <image.bmp> <output.vbf>");
    };
    let index: usize = index.to_string_lossy().parse()?;
    let bitmap = RgbaBitmap::open(&PathBuf::from(bmp))?;
    let output = PathBuf::from(output);

    let mut coordinator = Coordinator::new(Session::open(&PathBuf::from(vbf), &mut |_| {})?);
    let job = coordinator.spawn_mutation(move |session, progress| {
        session.replace_picture(index, &bitmap, progress)?;
        session.save(&output)
    })?;
    while let Some(progress) = job.next_progress() {
        println!("{}/{}", progress.current, progress.total);
    }
    coordinator.wait(job)?;
    Ok(())
}
