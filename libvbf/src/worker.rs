//! Background jobs over a [`Session`]
//!
//! A [`Coordinator`] owns the session. Read jobs borrow it shared and may overlap; a
//! mutation checks it out exclusively and sends it back to the coordinator when it
//! finishes, even if its [`Job`] was dropped. While a mutation runs, or while any read job
//! still holds the session, starting a mutation fails with [`Error::Busy`]. Jobs cannot be
//! cancelled.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, error, instrument};

use crate::{
    error::{Error, Result},
    session::Session,
};

/// How far a job has come: `current` of `total` steps are done
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Progress {
    /// Steps done so far
    pub current: usize,
    /// Steps the job will take
    pub total: usize,
}

/// A running job, see [`Coordinator::wait`]
#[derive(Debug)]
#[must_use = "a job must be waited on to get its result"]
pub struct Job<T> {
    handle: JoinHandle<Result<T>>,
    progress: Receiver<Progress>,
}

impl<T> Job<T> {
    /// Blocks until the job reports progress again
    ///
    /// Returns [`None`] once the job has finished.
    pub fn next_progress(&self) -> Option<Progress> {
        self.progress.recv().ok()
    }

    /// Progress reported since the last call, without blocking
    pub fn pending_progress(&self) -> impl Iterator<Item = Progress> + '_ {
        self.progress.try_iter()
    }

    /// True once the worker thread has returned
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Owns a [`Session`] and runs operations on it in worker threads
#[derive(Debug)]
pub struct Coordinator {
    session: Option<Arc<Session>>,
    returned_tx: Sender<Session>,
    returned: Receiver<Session>,
}

impl Coordinator {
    /// Takes ownership of `session`
    #[must_use]
    pub fn new(session: Session) -> Self {
        let (returned_tx, returned) = channel();
        Self {
            session: Some(Arc::new(session)),
            returned_tx,
            returned,
        }
    }

    /// Takes back a session sent home by a finished mutation
    fn reclaim(&mut self) {
        if self.session.is_none() {
            if let Ok(session) = self.returned.try_recv() {
                debug!("session returned by mutation job");
                self.session = Some(Arc::new(session));
            }
        }
    }

    /// Shared handle on the session
    ///
    /// Mutations fail with [`Error::Busy`] while the returned handle is alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a mutation has the session checked out
    pub fn session(&mut self) -> Result<Arc<Session>> {
        self.reclaim();
        self.session.clone().ok_or(Error::Busy)
    }

    /// Gives the session back, unless a job still holds it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if any job (or handle from [`Self::session`]) is alive
    pub fn into_session(mut self) -> Result<Session> {
        self.reclaim();
        self.session
            .and_then(|session| Arc::try_unwrap(session).ok())
            .ok_or(Error::Busy)
    }

    /// Runs `op` on a shared view of the session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a mutation has the session checked out
    #[instrument(level = "debug", skip_all)]
    pub fn spawn_read<T, F>(&mut self, op: F) -> Result<Job<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Session, &mut dyn FnMut(Progress)) -> Result<T> + Send + 'static,
    {
        let session = self.session()?;
        let (tx, progress) = channel();
        let handle = thread::spawn(move || run_guarded(|| op(&session, &mut reporter(&tx))));
        debug!("read job started");
        Ok(Job { handle, progress })
    }

    /// Runs `op` with exclusive access to the session
    ///
    /// The session stays checked out until the job's thread finishes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another job holds the session
    #[instrument(level = "debug", skip_all)]
    pub fn spawn_mutation<T, F>(&mut self, op: F) -> Result<Job<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session, &mut dyn FnMut(Progress)) -> Result<T> + Send + 'static,
    {
        self.reclaim();
        let shared = self.session.take().ok_or(Error::Busy)?;
        let mut session = match Arc::try_unwrap(shared) {
            Ok(session) => session,
            Err(shared) => {
                self.session = Some(shared);
                return Err(Error::Busy);
            }
        };
        let (tx, progress) = channel();
        let home = self.returned_tx.clone();
        let handle = thread::spawn(move || {
            let result = run_guarded(|| op(&mut session, &mut reporter(&tx)));
            // fails only once the coordinator is gone
            home.send(session).ok();
            result
        });
        debug!("mutation job started");
        Ok(Job { handle, progress })
    }

    /// Waits for `job` to finish and returns its result
    ///
    /// A session checked out by a mutation is back with the coordinator afterwards,
    /// whether the job succeeded or not.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or [`Error::WorkerPanicked`] if it panicked
    pub fn wait<T>(&mut self, job: Job<T>) -> Result<T> {
        let joined = job.handle.join();
        self.reclaim();
        joined.unwrap_or_else(|_| {
            error!("worker thread died without reporting");
            Err(Error::WorkerPanicked)
        })
    }
}

fn reporter(tx: &Sender<Progress>) -> impl FnMut(Progress) + '_ {
    move |progress| {
        // the receiving end may have been dropped by an uninterested caller
        tx.send(progress).ok();
    }
}

fn run_guarded<T>(op: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|_| {
        error!("operation panicked");
        Err(Error::WorkerPanicked)
    })
}
