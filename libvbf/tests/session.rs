use std::{sync::mpsc::channel, thread, time::Duration};

mod common;
use common::{bitmap, sample_container, sample_session, BLUE, GREEN, RED, YELLOW};
use libvbf::{
    Coordinator, DomainError, EifKind, Error, Progress, ResourceType, RgbaBitmap, Session,
};
use mktemp::Temp;

fn two_colors(width: u16, height: u16, a: [u8; 3], b: [u8; 3]) -> RgbaBitmap {
    bitmap(width, height, |x, _| {
        let [r, g, b] = if x % 2 == 0 { a } else { b };
        [r, g, b, 255]
    })
}

#[test]
fn pictures_are_unpacked_in_item_order() -> anyhow::Result<()> {
    let mut seen = Vec::new();
    let session = Session::from_container(sample_container(), &mut |p| seen.push(p))?;

    let names = session
        .pictures()
        .iter()
        .map(|p| p.name().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        ["needle.eif", "gauge.eif", "warning.eif", "logo.eif", "photo.eif"]
    );
    assert_eq!(session.picture(3)?.kind(), EifKind::Monochrome);
    assert_eq!(session.records().len(), 5);
    assert_eq!(seen.last(), Some(&Progress { current: 5, total: 5 }));

    let groups = session.palette_groups();
    assert_eq!(groups.len(), 2);
    assert!(groups.values().any(|g| g == &[0, 1]));
    assert!(groups.values().any(|g| g == &[2]));
    assert_eq!(session.group_of(1)?, vec![0, 1]);
    assert_eq!(session.group_of(4)?, vec![4]);
    assert!(matches!(
        session.group_of(5),
        Err(Error::Domain(DomainError::UnknownPicture(5)))
    ));
    Ok(())
}

#[test]
fn replacing_a_supercolor_picture() -> anyhow::Result<()> {
    let mut session = sample_session();
    let untouched = (0..4)
        .map(|i| session.section().item_data(ResourceType::Zip, i).map(<[u8]>::to_vec))
        .collect::<libvbf::Result<Vec<_>>>()?;

    let replacement = bitmap(2, 2, |x, y| [x as u8 * 100, y as u8 * 100, 7, 128]);
    session.replace_picture(4, &replacement, &mut |_| {})?;

    assert_eq!(session.picture(4)?.image().to_rgba()?, replacement);
    for (i, data) in untouched.iter().enumerate() {
        assert_eq!(session.section().item_data(ResourceType::Zip, i)?, data.as_slice());
    }
    assert_eq!(session.records()[4].eif_type, u8::from(EifKind::Supercolor));
    assert_eq!(session.container().dirty_sections().collect::<Vec<_>>(), vec![1]);
    Ok(())
}

#[test]
fn wrong_size_leaves_the_session_untouched() {
    let mut session = sample_session();
    let bytes = session.container().to_bytes();
    let pictures = session.pictures().to_vec();

    let err = session
        .replace_picture(0, &two_colors(3, 2, RED, BLUE), &mut |_| {})
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Domain(DomainError::DimensionMismatch {
            expected: (4, 2),
            actual: (3, 2)
        })
    ));
    assert_eq!(session.container().to_bytes(), bytes);
    assert_eq!(session.pictures(), pictures.as_slice());
    assert!(!session.container().is_dirty());

    assert!(matches!(
        session.replace_picture(17, &two_colors(4, 2, RED, BLUE), &mut |_| {}),
        Err(Error::Domain(DomainError::UnknownPicture(17)))
    ));
}

#[test]
fn replacing_a_bonded_picture_recolors_its_group() -> anyhow::Result<()> {
    let mut session = sample_session();
    let partner = session.picture(1)?.image().to_rgba()?;
    let loner = session.section().item_data(ResourceType::Zip, 2)?.to_vec();

    let replacement = two_colors(4, 2, YELLOW, GREEN);
    let mut seen = Vec::new();
    session.replace_picture(0, &replacement, &mut |p| seen.push(p))?;

    // exact, since the group uses only four colors
    assert_eq!(session.picture(0)?.image().to_rgba()?, replacement);
    assert_eq!(session.picture(1)?.image().to_rgba()?, partner);
    assert_eq!(
        session.picture(0)?.palette_key(),
        session.picture(1)?.palette_key()
    );
    assert_eq!(
        session.picture(0)?.image().as_multicolor()?.palette().colors()[..4],
        [BLUE, GREEN, RED, YELLOW]
    );
    assert_eq!(session.section().item_data(ResourceType::Zip, 2)?, loner.as_slice());
    assert_eq!(session.group_of(0)?, vec![0, 1]);

    // two pictures packed, five unpacked
    assert_eq!(seen.len(), 7);
    assert!(seen.windows(2).all(|w| w[0].current < w[1].current));
    assert!(seen.iter().all(|p| p.total == 7));
    Ok(())
}

#[test]
fn saved_edits_can_be_reopened() -> anyhow::Result<()> {
    let dir = Temp::new_dir()?;
    let path = dir.as_path().join("cluster.vbf");
    let mut session = sample_session();
    let replacement = bitmap(3, 3, |x, y| {
        let v = u8::try_from(x * 3 + y).unwrap() * 20;
        [v, v, v, 255]
    });
    session.replace_picture(3, &replacement, &mut |_| {})?;
    session.save(&path)?;
    assert_eq!(session.path(), Some(path.as_path()));

    let reopened = Session::open(&path, &mut |_| {})?;
    assert_eq!(reopened.pictures(), session.pictures());
    assert_eq!(reopened.records(), session.records());
    assert_eq!(reopened.picture(3)?.image().to_rgba()?, replacement);
    Ok(())
}

#[test]
fn export_writes_one_bmp_per_picture() -> anyhow::Result<()> {
    let dir = Temp::new_dir()?;
    let session = sample_session();
    let written = session.export_all(dir.as_path(), &mut |_| {})?;

    assert_eq!(written.len(), 5);
    assert_eq!(written[0], dir.as_path().join("needle.bmp"));
    for (picture, path) in session.pictures().iter().zip(&written) {
        assert_eq!(RgbaBitmap::open(path)?, picture.image().to_rgba()?);
    }
    Ok(())
}

#[test]
fn mutations_are_exclusive() -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(sample_session());
    let (release, gate) = channel::<()>();

    let job = coordinator.spawn_mutation(move |session, progress| {
        gate.recv().ok();
        progress(Progress { current: 1, total: 1 });
        Ok(session.pictures().len())
    })?;
    assert!(matches!(
        coordinator.spawn_read(|session, _| Ok(session.pictures().len())),
        Err(Error::Busy)
    ));
    assert!(matches!(
        coordinator.spawn_mutation(|_, _| Ok(())),
        Err(Error::Busy)
    ));

    release.send(())?;
    assert_eq!(job.next_progress(), Some(Progress { current: 1, total: 1 }));
    assert_eq!(coordinator.wait(job)?, 5);

    // the session is back
    let read = coordinator.spawn_read(|session, _| Ok(session.pictures().len()))?;
    assert_eq!(coordinator.wait(read)?, 5);
    Ok(())
}

#[test]
fn readers_block_mutations() -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(sample_session());
    let (release, gate) = channel::<()>();
    let reader = coordinator.spawn_read(move |session, _| {
        gate.recv().ok();
        Ok(session.palette_groups().len())
    })?;
    let other = coordinator.spawn_read(|session, _| Ok(session.records().len()))?;

    assert!(matches!(
        coordinator.spawn_mutation(|_, _| Ok(())),
        Err(Error::Busy)
    ));
    release.send(())?;
    assert_eq!(coordinator.wait(reader)?, 2);
    assert_eq!(coordinator.wait(other)?, 5);

    let replacement = two_colors(2, 2, RED, GREEN);
    let job = coordinator.spawn_mutation(move |session, progress| {
        session.replace_picture(2, &replacement, progress)
    })?;
    while job.next_progress().is_some() {}
    coordinator.wait(job)?;
    assert!(coordinator.into_session()?.container().is_dirty());
    Ok(())
}

#[test]
fn failed_jobs_hand_the_session_back() -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(sample_session());

    let job = coordinator.spawn_mutation(|session, progress| {
        session.replace_picture(0, &two_colors(1, 1, RED, RED), progress)
    })?;
    assert!(matches!(coordinator.wait(job), Err(Error::Domain(_))));

    let job = coordinator.spawn_mutation(|_, _| -> libvbf::Result<()> {
        panic!("worker blew up");
    })?;
    assert!(matches!(coordinator.wait(job), Err(Error::WorkerPanicked)));

    let session = coordinator.into_session()?;
    assert!(!session.container().is_dirty());
    Ok(())
}

#[test]
fn dropped_mutation_still_returns_the_session() -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(sample_session());
    let (release, gate) = channel::<()>();
    let job = coordinator.spawn_mutation(move |session, _| {
        gate.recv().ok();
        session.replace_picture(2, &two_colors(2, 2, RED, GREEN), &mut |_| {})
    })?;
    drop(job);
    assert!(matches!(coordinator.session(), Err(Error::Busy)));
    release.send(())?;

    let mut attempts = 0;
    let read = loop {
        match coordinator.spawn_read(|session, _| Ok(session.pictures().len())) {
            Ok(read) => break read,
            Err(Error::Busy) if attempts < 500 => {
                attempts += 1;
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(e.into()),
        }
    };
    assert_eq!(coordinator.wait(read)?, 5);
    assert!(coordinator.into_session()?.container().is_dirty());
    Ok(())
}
