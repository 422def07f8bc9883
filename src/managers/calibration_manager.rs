// CalibrationManager: Focused manager for calibration workflow
//
// Single Responsibility: Calibration session and reference persistence
// Cloneable handle so calibration commands can be issued from a thread other
// than the tick loop.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::calibration::{
    CalibrationMap, CalibrationProgress, CalibrationSession, CalibrationStore, SessionStatus,
};
use crate::error::{log_calibration_error, CalibrationError};
use crate::types::{Position, Vector3};

/// Manages the single active calibration session and the calibration store
///
/// This manager handles:
/// - Starting/cancelling a calibration session (one at a time)
/// - Advancing the session once per engine tick
/// - Persisting completed references
/// - Read access to the cached calibration map for the classifier
///
/// # Example
/// ```ignore
/// let manager = CalibrationManager::new(CalibrationStore::in_memory(), Duration::from_secs(1));
/// manager.start(Position::Arriba, Instant::now())?;
/// // ... once per tick ...
/// manager.tick(Some(reading), Instant::now())?;
/// ```
#[derive(Clone)]
pub struct CalibrationManager {
    session: Arc<Mutex<Option<CalibrationSession>>>,
    store: Arc<RwLock<CalibrationStore>>,
    sample_duration: Duration,
}

impl CalibrationManager {
    /// Create a manager over `store`; every session samples for `sample_duration`
    pub fn new(store: CalibrationStore, sample_duration: Duration) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            store: Arc::new(RwLock::new(store)),
            sample_duration,
        }
    }

    /// Start a calibration session for `target`
    ///
    /// # Errors
    /// - `AlreadyInProgress` when another session is still sampling
    /// - `StatePoisoned` on lock poisoning
    pub fn start(
        &self,
        target: Position,
        now: Instant,
    ) -> Result<CalibrationProgress, CalibrationError> {
        let mut session_guard = self.lock_session()?;

        self.check_not_in_progress(&session_guard)?;

        let session = CalibrationSession::start(target, self.sample_duration, now);
        let progress = session.progress();
        *session_guard = Some(session);

        Ok(progress)
    }

    /// Discard the active session without writing anything
    ///
    /// # Returns
    /// Target of the cancelled session
    pub fn cancel(&self) -> Result<Position, CalibrationError> {
        let mut session_guard = self.lock_session()?;

        match session_guard.take() {
            Some(session) => {
                log::info!("[CalibrationManager] Cancelled {} calibration", session.target());
                Ok(session.target())
            }
            None => {
                let err = CalibrationError::NotInProgress;
                log_calibration_error(&err, "cancel_calibration");
                Err(err)
            }
        }
    }

    /// Advance the active session, if any
    ///
    /// A completed session is saved to the store and removed. An aborted
    /// session (no readings) is removed without touching the store.
    ///
    /// # Returns
    /// * `Ok(None)` - No session active
    /// * `Ok(Some(status))` - Status after this tick
    pub fn tick(
        &self,
        reading: Option<Vector3>,
        now: Instant,
    ) -> Result<Option<SessionStatus>, CalibrationError> {
        let mut session_guard = self.lock_session()?;

        let Some(session) = session_guard.as_mut() else {
            return Ok(None);
        };
        let status = session.tick(reading, now);

        match status {
            SessionStatus::Sampling(_) => {}
            SessionStatus::Completed {
                target,
                reference,
                samples,
            } => {
                *session_guard = None;
                drop(session_guard);
                log::info!(
                    "[CalibrationManager] {} calibrated to {} from {} samples",
                    target,
                    reference,
                    samples
                );
                // Failures are logged by save(); the cached map already holds the reference
                let _ = self.save(target, reference);
            }
            SessionStatus::Aborted { target } => {
                *session_guard = None;
                log_calibration_error(&CalibrationError::EmptySample { target }, "tick_calibration");
            }
        }

        Ok(Some(status))
    }

    /// Progress of the active session
    pub fn progress(&self) -> Option<CalibrationProgress> {
        self.lock_session()
            .ok()
            .and_then(|guard| guard.as_ref().map(CalibrationSession::progress))
    }

    pub fn is_calibrating(&self) -> bool {
        self.progress().is_some()
    }

    /// Persist a reference directly, bypassing a session
    ///
    /// The cached map is updated even when the backend write fails.
    pub fn save(&self, position: Position, reference: Vector3) -> Result<(), CalibrationError> {
        let mut store_guard = self.write_store()?;
        store_guard.save(position, reference).inspect_err(|err| {
            log_calibration_error(err, "save_calibration");
        })
    }

    /// Remove the ambient baseline and every reference
    ///
    /// An in-flight session keeps sampling and saves its result when done.
    pub fn clear_all(&self) -> Result<(), CalibrationError> {
        let mut store_guard = self.write_store()?;
        store_guard.clear_all().inspect_err(|err| {
            log_calibration_error(err, "clear_all_calibrations");
        })?;
        log::info!("[CalibrationManager] Cleared all calibrations");
        Ok(())
    }

    /// Re-read persisted references from the backend
    pub fn reload(&self) -> Result<(), CalibrationError> {
        self.write_store()?.reload();
        Ok(())
    }

    /// Run `f` against the cached calibration map
    pub fn with_map<R>(&self, f: impl FnOnce(&CalibrationMap) -> R) -> Result<R, CalibrationError> {
        let store_guard = self.read_store()?;
        Ok(f(store_guard.map()))
    }

    /// Copy of the cached calibration map
    pub fn snapshot(&self) -> Result<CalibrationMap, CalibrationError> {
        self.with_map(CalibrationMap::clone)
    }

    /// Raw keys held by the store backend
    pub fn stored_keys(&self) -> Result<Vec<String>, CalibrationError> {
        Ok(self.read_store()?.keys())
    }

    pub fn sample_duration(&self) -> Duration {
        self.sample_duration
    }

    // ========================================================================
    // HELPER METHODS - Lock management and validation
    // ========================================================================

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<CalibrationSession>>, CalibrationError> {
        self.session
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, CalibrationStore>, CalibrationError> {
        self.store
            .read()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, CalibrationStore>, CalibrationError> {
        self.store
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    /// Check that calibration is not already in progress
    fn check_not_in_progress(
        &self,
        session_guard: &MutexGuard<'_, Option<CalibrationSession>>,
    ) -> Result<(), CalibrationError> {
        if let Some(active) = session_guard.as_ref() {
            let err = CalibrationError::AlreadyInProgress {
                active: active.target(),
            };
            log_calibration_error(&err, "start_calibration");
            return Err(err);
        }
        Ok(())
    }
}

impl std::fmt::Debug for CalibrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationManager")
            .field("sample_duration", &self.sample_duration)
            .field("calibrating", &self.is_calibrating())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CalibrationManager {
        CalibrationManager::new(CalibrationStore::in_memory(), Duration::from_secs(1))
    }

    fn run_session(manager: &CalibrationManager, reading: Vector3, t0: Instant) -> SessionStatus {
        for i in 0..10 {
            manager
                .tick(Some(reading), t0 + Duration::from_millis(i * 100))
                .unwrap();
        }
        manager
            .tick(Some(reading), t0 + Duration::from_secs(1))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_new() {
        let manager = manager();
        assert!(!manager.is_calibrating());
        assert!(manager.snapshot().unwrap().is_empty());
        assert_eq!(manager.tick(None, Instant::now()).unwrap(), None);
    }

    #[test]
    fn test_start_calibration() {
        let manager = manager();
        let progress = manager.start(Position::Centro, Instant::now()).unwrap();
        assert_eq!(progress.target, Position::Centro);
        assert_eq!(progress.duration_ms, 1000);
        assert!(manager.is_calibrating());
    }

    #[test]
    fn test_start_calibration_already_in_progress() {
        let manager = manager();
        let now = Instant::now();
        manager.start(Position::Arriba, now).unwrap();

        let result = manager.start(Position::Abajo, now);
        assert_eq!(
            result,
            Err(CalibrationError::AlreadyInProgress {
                active: Position::Arriba
            })
        );
        assert_eq!(manager.progress().unwrap().target, Position::Arriba);
    }

    #[test]
    fn test_completed_session_is_saved() {
        let manager = manager();
        let t0 = Instant::now();
        manager.start(Position::Centro, t0).unwrap();

        let status = run_session(&manager, Vector3::new(10.0, 0.0, 0.0), t0);
        assert!(matches!(status, SessionStatus::Completed { .. }));
        assert!(!manager.is_calibrating());
        assert_eq!(
            manager.with_map(|map| map.get(Position::Centro)).unwrap(),
            Some(Vector3::new(10.0, 0.0, 0.0))
        );
        assert_eq!(manager.stored_keys().unwrap(), vec!["cal_pos_Centro".to_string()]);
    }

    #[test]
    fn test_empty_session_leaves_prior_value() {
        let manager = manager();
        manager
            .save(Position::Ambiente, Vector3::new(1.0, 1.0, 1.0))
            .unwrap();

        let t0 = Instant::now();
        manager.start(Position::Ambiente, t0).unwrap();
        manager.tick(None, t0).unwrap();
        let status = manager.tick(None, t0 + Duration::from_secs(2)).unwrap();

        assert_eq!(
            status,
            Some(SessionStatus::Aborted {
                target: Position::Ambiente
            })
        );
        assert!(!manager.is_calibrating());
        assert_eq!(
            manager.snapshot().unwrap().ambient(),
            Vector3::new(1.0, 1.0, 1.0)
        );
    }

    #[test]
    fn test_cancel() {
        let manager = manager();
        assert_eq!(manager.cancel(), Err(CalibrationError::NotInProgress));

        let t0 = Instant::now();
        manager.start(Position::Derecha, t0).unwrap();
        manager.tick(Some(Vector3::new(40.0, 0.0, 0.0)), t0).unwrap();
        assert_eq!(manager.cancel(), Ok(Position::Derecha));
        assert!(!manager.is_calibrating());
        assert!(!manager.snapshot().unwrap().has(Position::Derecha));

        // A new session can start right away
        assert!(manager.start(Position::Izquierda, t0).is_ok());
    }

    #[test]
    fn test_clear_all() {
        let manager = manager();
        manager.save(Position::Ambiente, Vector3::new(1.0, 0.0, 0.0)).unwrap();
        manager.save(Position::Acercar, Vector3::new(0.0, 0.0, 60.0)).unwrap();

        manager.clear_all().unwrap();
        assert!(manager.snapshot().unwrap().is_empty());
        assert!(manager.stored_keys().unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let manager = manager();
        let handle = manager.clone();
        let now = Instant::now();

        std::thread::spawn(move || handle.start(Position::Abajo, now))
            .join()
            .unwrap()
            .unwrap();

        assert_eq!(manager.progress().unwrap().target, Position::Abajo);
    }
}
