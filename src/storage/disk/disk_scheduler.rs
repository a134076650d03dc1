use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::common::{KilnError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// One disk I/O request handed to the worker thread.
pub struct DiskRequest {
    is_write: bool,
    page_id: PageId,
    /// For reads the worker fills these bytes; for writes it consumes them.
    /// The caller must keep the buffer alive until the callback fires.
    data: *mut u8,
    callback: Option<std::sync::mpsc::Sender<bool>>,
}

// The data pointer is only touched by the worker thread, and callers block
// on the callback before releasing the buffer.
unsafe impl Send for DiskRequest {}

/// Owns a background worker that drains a bounded request queue against the
/// disk manager. The buffer pool uses the synchronous wrappers; the raw
/// `schedule` entry point exists for callers that manage their own
/// completion.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Sender<DiskRequest>,
    shutdown: Arc<AtomicBool>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);
        let shutdown = Arc::new(AtomicBool::new(false));

        let dm = Arc::clone(&disk_manager);
        let shutdown_flag = Arc::clone(&shutdown);
        let worker_handle = thread::spawn(move || Self::worker_loop(dm, receiver, shutdown_flag));

        Self {
            disk_manager,
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| KilnError::DiskScheduler(format!("failed to schedule request: {e}")))
    }

    /// Reads a page and blocks until the worker completes it.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let (tx, rx) = std::sync::mpsc::channel();
        self.schedule(DiskRequest {
            is_write: false,
            page_id,
            data: data.as_mut_ptr(),
            callback: Some(tx),
        })?;
        rx.recv()
            .map_err(|e| KilnError::DiskScheduler(format!("read completion lost: {e}")))?;
        Ok(())
    }

    /// Writes a page and blocks until the worker completes it.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let (tx, rx) = std::sync::mpsc::channel();
        // The worker only reads through the pointer for write requests.
        self.schedule(DiskRequest {
            is_write: true,
            page_id,
            data: data.as_ptr() as *mut u8,
            callback: Some(tx),
        })?;
        rx.recv()
            .map_err(|e| KilnError::DiskScheduler(format!("write completion lost: {e}")))?;
        Ok(())
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    fn worker_loop(
        disk_manager: Arc<DiskManager>,
        receiver: Receiver<DiskRequest>,
        shutdown: Arc<AtomicBool>,
    ) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                // Drain what is queued before exiting.
                while let Ok(request) = receiver.try_recv() {
                    Self::process(&disk_manager, request);
                }
                break;
            }

            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(request) => Self::process(&disk_manager, request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process(disk_manager: &DiskManager, request: DiskRequest) {
        let success = if request.is_write {
            let data = unsafe { std::slice::from_raw_parts(request.data, PAGE_SIZE) };
            disk_manager.write_page(request.page_id, data).is_ok()
        } else {
            let data = unsafe { std::slice::from_raw_parts_mut(request.data, PAGE_SIZE) };
            disk_manager.read_page(request.page_id, data).is_ok()
        };

        if let Some(callback) = request.callback {
            let _ = callback.send(success);
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
