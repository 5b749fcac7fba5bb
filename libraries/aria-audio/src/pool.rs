/// Worker pool for parallel sample conversion
///
/// Packets leave the container strictly sequentially, but converting their
/// decoded frames to the canonical format is embarrassingly parallel. The
/// pool fans frames out to a fixed set of workers and reassembles results
/// in presentation order.
use crate::convert::SampleConverter;
use crate::frame::Frame;
use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;

/// Number of conversion workers: half the physical cores, at least two.
pub fn decode_thread_count() -> usize {
    (num_cpus::get_physical() / 2).max(2)
}

struct Job {
    seq: usize,
    frame: Frame,
}

struct JobResult {
    seq: usize,
    timestamp: i64,
    planes: Vec<Vec<f32>>,
}

/// Fixed-size pool converting frames to canonical planar f32.
///
/// Workers live for the lifetime of the pool and shut down when it is
/// dropped.
pub struct ConversionPool {
    job_tx: Option<Sender<Job>>,
    result_rx: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl ConversionPool {
    pub fn new() -> Self {
        Self::with_workers(decode_thread_count())
    }

    pub fn with_workers(count: usize) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Job>(count * 4);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<JobResult>();

        let workers = (0..count.max(1))
            .map(|i| {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                std::thread::Builder::new()
                    .name(format!("aria-convert-{i}"))
                    .spawn(move || {
                        while let Ok(job) = jobs.recv() {
                            let converter = SampleConverter::new(job.frame.descriptor());
                            let result = JobResult {
                                seq: job.seq,
                                timestamp: job.frame.timestamp(),
                                planes: converter.convert_frame(&job.frame),
                            };
                            if results.send(result).is_err() {
                                break;
                            }
                        }
                    })
                    .expect("failed to spawn conversion worker")
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            result_rx,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Convert a batch of frames, returning canonical planes ordered by
    /// ascending timestamp (submission order breaks ties).
    ///
    /// Blocks until every frame in the batch has been converted.
    pub fn convert_batch(&self, frames: Vec<Frame>) -> Vec<Vec<Vec<f32>>> {
        let count = frames.len();
        let tx = self
            .job_tx
            .as_ref()
            .expect("pool used after shutdown");

        for (seq, frame) in frames.into_iter().enumerate() {
            tx.send(Job { seq, frame })
                .expect("conversion workers exited");
        }

        let mut results: Vec<JobResult> = Vec::with_capacity(count);
        for _ in 0..count {
            results.push(self.result_rx.recv().expect("conversion workers exited"));
        }
        results.sort_by_key(|r| (r.timestamp, r.seq));
        results.into_iter().map(|r| r.planes).collect()
    }
}

impl Default for ConversionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConversionPool {
    fn drop(&mut self) {
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
