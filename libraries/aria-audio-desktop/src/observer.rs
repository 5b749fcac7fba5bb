// aria-audio-desktop/src/observer.rs
//
// Render observer dispatch, off the real-time render thread

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use aria_core::RenderObserver;

/// Buffers kept in circulation between the render path and the dispatch
/// thread. Matches the event queue depth so a full queue can always take
/// its buffers back.
const POOL_SLOTS: usize = 4;

/// Initial per-plane capacity. A callback larger than this grows the
/// buffer once; the grown buffer then recycles at its new capacity.
const POOL_FRAME_CAPACITY: usize = 4096;

/// Events handed from the render path to the dispatch thread
pub(crate) enum RenderEvent {
    /// A buffer was rendered to the device
    Rendered {
        frame_count: usize,
        planes: Vec<Vec<f32>>,
    },
    /// The output device changed
    DeviceChanged {
        buffer_size: usize,
        sample_rate: u32,
    },
    /// The active device's sample rate changed
    SampleRateChanged { sample_rate: u32 },
}

/// Fixed set of plane buffers recycled between the render path and the
/// dispatch thread, so the render callback never allocates for the tap.
pub(crate) struct BufferPool {
    tx: Sender<Vec<Vec<f32>>>,
    rx: Receiver<Vec<Vec<f32>>>,
}

impl BufferPool {
    pub fn new(channels: usize) -> Self {
        let (tx, rx) = bounded(POOL_SLOTS);
        for _ in 0..POOL_SLOTS {
            let planes: Vec<Vec<f32>> = (0..channels)
                .map(|_| Vec::with_capacity(POOL_FRAME_CAPACITY))
                .collect();
            let _ = tx.try_send(planes);
        }
        Self { tx, rx }
    }

    /// Take a free buffer. `None` when all are in flight.
    pub fn take(&self) -> Option<Vec<Vec<f32>>> {
        self.rx.try_recv().ok()
    }

    pub fn put_back(&self, planes: Vec<Vec<f32>>) {
        let _ = self.tx.try_send(planes);
    }

    /// Sender half for the dispatch thread to return drained buffers.
    pub fn recycler(&self) -> Sender<Vec<Vec<f32>>> {
        self.tx.clone()
    }
}

/// Sender side of the dispatch queue, shared with the render callback.
///
/// `enabled` gates only the post-render tap; device and sample rate
/// notifications are always delivered while an observer is registered.
pub(crate) struct ObserverTap {
    pub tx: Option<Sender<RenderEvent>>,
    pub pool: Option<BufferPool>,
    pub enabled: bool,
}

impl ObserverTap {
    pub fn new() -> Self {
        Self {
            tx: None,
            pool: None,
            enabled: false,
        }
    }

    /// Queue a device event without ever blocking. Full queue drops it.
    pub fn send(&self, event: RenderEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }

    /// Copy `planes` into a pooled buffer and queue it. Never blocks and
    /// never allocates on the steady state: a drained pool skips the
    /// cycle, and a full queue hands the buffer straight back.
    pub fn send_rendered(&self, frame_count: usize, planes: &[Vec<f32>]) {
        if !self.enabled {
            return;
        }
        let (Some(tx), Some(pool)) = (&self.tx, &self.pool) else {
            return;
        };
        let Some(mut pooled) = pool.take() else {
            return;
        };
        for (dst, src) in pooled.iter_mut().zip(planes) {
            dst.clear();
            dst.extend_from_slice(src);
        }
        if let Err(err) = tx.try_send(RenderEvent::Rendered {
            frame_count,
            planes: pooled,
        }) {
            if let RenderEvent::Rendered { planes, .. } = err.into_inner() {
                pool.put_back(planes);
            }
        }
    }
}

/// Single observer slot. Registering a new observer replaces the previous
/// one; its dispatch thread drains and exits when the sender is dropped.
pub(crate) struct ObserverSlot {
    thread: Option<JoinHandle<()>>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self { thread: None }
    }

    pub fn is_registered(&self) -> bool {
        self.thread.is_some()
    }

    /// Install `observer`, returning the sender and buffer pool the render
    /// path should use. Any previously registered observer is shut down
    /// first. The dispatch thread returns each drained buffer to the pool.
    pub fn install(
        &mut self,
        mut observer: Box<dyn RenderObserver>,
        channels: usize,
    ) -> (Sender<RenderEvent>, BufferPool) {
        self.clear();

        let (tx, rx) = bounded::<RenderEvent>(4);
        let pool = BufferPool::new(channels);
        let recycle = pool.recycler();

        let handle = thread::Builder::new()
            .name("aria-render-observer".to_string())
            .spawn(move || {
                while let Ok(event) = rx.recv() {
                    match event {
                        RenderEvent::Rendered {
                            frame_count,
                            planes,
                        } => {
                            observer.rendered(frame_count, &planes);
                            let _ = recycle.try_send(planes);
                        }
                        RenderEvent::DeviceChanged {
                            buffer_size,
                            sample_rate,
                        } => observer.device_changed(buffer_size, sample_rate),
                        RenderEvent::SampleRateChanged { sample_rate } => {
                            observer.sample_rate_changed(sample_rate);
                        }
                    }
                }
            })
            .ok();

        self.thread = handle;
        (tx, pool)
    }

    /// Shut down the current observer, if any. The caller must have dropped
    /// all senders first or this will block on the dispatch thread.
    pub fn clear(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Counting {
        rendered: Arc<AtomicUsize>,
        device_changes: Arc<AtomicUsize>,
        rate_changes: Arc<AtomicUsize>,
    }

    impl RenderObserver for Counting {
        fn rendered(&mut self, _frame_count: usize, _planes: &[Vec<f32>]) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }

        fn device_changed(&mut self, _new_buffer_size: usize, _new_sample_rate: u32) {
            self.device_changes.fetch_add(1, Ordering::SeqCst);
        }

        fn sample_rate_changed(&mut self, _new_sample_rate: u32) {
            self.rate_changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Counting, Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let rendered = Arc::new(AtomicUsize::new(0));
        let device_changes = Arc::new(AtomicUsize::new(0));
        let rate_changes = Arc::new(AtomicUsize::new(0));
        let observer = Counting {
            rendered: Arc::clone(&rendered),
            device_changes: Arc::clone(&device_changes),
            rate_changes: Arc::clone(&rate_changes),
        };
        (observer, rendered, device_changes, rate_changes)
    }

    fn tap_for(slot: &mut ObserverSlot, observer: Box<dyn RenderObserver>, enabled: bool) -> ObserverTap {
        let (tx, pool) = slot.install(observer, 2);
        ObserverTap {
            tx: Some(tx),
            pool: Some(pool),
            enabled,
        }
    }

    #[test]
    fn events_reach_the_observer() {
        let (observer, rendered, device_changes, rate_changes) = counting();

        let mut slot = ObserverSlot::new();
        let mut tap = tap_for(&mut slot, Box::new(observer), true);

        tap.send_rendered(512, &vec![vec![0.0; 512]; 2]);
        tap.send(RenderEvent::DeviceChanged {
            buffer_size: 512,
            sample_rate: 48000,
        });
        tap.send(RenderEvent::SampleRateChanged { sample_rate: 96000 });

        // Drop the sender so the dispatch thread drains and exits.
        tap.tx = None;
        slot.clear();

        assert_eq!(rendered.load(Ordering::SeqCst), 1);
        assert_eq!(device_changes.load(Ordering::SeqCst), 1);
        assert_eq!(rate_changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn paused_tap_still_delivers_device_events() {
        let (observer, rendered, device_changes, _) = counting();

        let mut slot = ObserverSlot::new();
        let mut tap = tap_for(&mut slot, Box::new(observer), false);

        tap.send_rendered(512, &vec![vec![0.0; 512]; 2]);
        tap.send(RenderEvent::DeviceChanged {
            buffer_size: 512,
            sample_rate: 48000,
        });

        tap.tx = None;
        slot.clear();

        assert_eq!(rendered.load(Ordering::SeqCst), 0);
        assert_eq!(device_changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        struct Slow;
        impl RenderObserver for Slow {
            fn rendered(&mut self, _: usize, _: &[Vec<f32>]) {
                thread::sleep(Duration::from_millis(50));
            }
            fn device_changed(&mut self, _: usize, _: u32) {}
            fn sample_rate_changed(&mut self, _: u32) {}
        }

        let mut slot = ObserverSlot::new();
        let mut tap = tap_for(&mut slot, Box::new(Slow), true);

        // Far more events than the queue holds; send must never block.
        let start = std::time::Instant::now();
        for _ in 0..64 {
            tap.send_rendered(16, &[vec![0.0; 16], vec![0.0; 16]]);
        }
        assert!(start.elapsed() < Duration::from_millis(500));

        tap.tx = None;
        tap.pool = None;
        slot.clear();
    }

    #[test]
    fn drained_buffers_return_to_the_pool() {
        let (observer, rendered, _, _) = counting();

        let mut slot = ObserverSlot::new();
        let mut tap = tap_for(&mut slot, Box::new(observer), true);

        // Many more sends than the pool holds; the dispatch thread keeps
        // recycling, so deliveries keep happening.
        for _ in 0..32 {
            tap.send_rendered(16, &[vec![0.25; 16], vec![0.25; 16]]);
            thread::sleep(Duration::from_millis(2));
        }

        tap.tx = None;
        tap.pool = None;
        slot.clear();

        assert!(rendered.load(Ordering::SeqCst) > POOL_SLOTS);
    }

    #[test]
    fn drained_pool_skips_the_cycle_without_losing_buffers() {
        let pool = BufferPool::new(2);
        let held: Vec<_> = std::iter::from_fn(|| pool.take()).collect();
        assert_eq!(held.len(), POOL_SLOTS);

        let tap = ObserverTap {
            tx: Some(bounded::<RenderEvent>(4).0),
            pool: Some(pool),
            enabled: true,
        };
        // No free buffer; the send is a no-op.
        tap.send_rendered(16, &[vec![0.5; 16], vec![0.5; 16]]);

        let pool = tap.pool.unwrap();
        for planes in held {
            pool.put_back(planes);
        }
        assert!(pool.take().is_some());
    }

    #[test]
    fn installing_replaces_previous_observer() {
        let (first, first_rendered, _, _) = counting();
        let (second, second_rendered, _, _) = counting();

        let mut slot = ObserverSlot::new();
        let (tx1, pool1) = slot.install(Box::new(first), 2);
        drop(tx1);
        drop(pool1);

        let mut tap = tap_for(&mut slot, Box::new(second), true);
        tap.send_rendered(8, &[vec![0.0; 8], vec![0.0; 8]]);

        tap.tx = None;
        tap.pool = None;
        drop(tap);
        slot.clear();

        assert_eq!(first_rendered.load(Ordering::SeqCst), 0);
        assert_eq!(second_rendered.load(Ordering::SeqCst), 1);
    }
}
