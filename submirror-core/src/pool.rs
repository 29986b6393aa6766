//! Bounded worker pool for repository I/O.
//!
//! Work is handed over in per-repository groups: a group runs sequentially on one blocking
//! worker, at most `jobs` groups run at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// Shared abort flag, checked between repository operations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct WorkerPool {
    runtime: tokio::runtime::Runtime,
    jobs: usize,
    cancel: CancelFlag,
}

impl WorkerPool {
    pub fn new(jobs: usize, cancel: CancelFlag) -> anyhow::Result<Self> {
        let jobs = jobs.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(jobs.min(4))
            .max_blocking_threads(jobs)
            .thread_name("submirror-worker")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            jobs,
            cancel,
        })
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Set the cancel flag on the first Ctrl-C instead of terminating the process.
    pub fn cancel_on_interrupt(&self) {
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing running jobs, skipping the rest");
                cancel.cancel();
            }
        });
    }

    /// Run `work` once per group. Results come back sorted by group key; a group whose worker
    /// panicked yields `None`.
    pub fn run_groups<T, R, F>(
        &self,
        groups: Vec<(String, T)>,
        work: F,
    ) -> Vec<(String, Option<R>)>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(&str, T, &CancelFlag) -> R + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let semaphore = Arc::new(Semaphore::new(self.jobs));

        self.runtime.block_on(async {
            let mut set = JoinSet::new();
            for (key, group) in groups {
                let sem = semaphore.clone();
                let work = work.clone();
                let cancel = self.cancel.clone();
                set.spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return (key, None);
                    };
                    let worker_key = key.clone();
                    let joined =
                        tokio::task::spawn_blocking(move || (*work)(&worker_key, group, &cancel))
                            .await;
                    match joined {
                        Ok(result) => (key, Some(result)),
                        Err(err) => {
                            error!(group = %key, error = %err, "worker failed");
                            (key, None)
                        }
                    }
                });
            }

            let mut out = Vec::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(result) => out.push(result),
                    Err(err) => error!(error = %err, "worker task failed"),
                }
            }
            out.sort_by(|a, b| a.0.cmp(&b.0));
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn every_group_runs_once_and_results_are_sorted() {
        let pool = WorkerPool::new(2, CancelFlag::new()).expect("pool");
        let groups = vec![
            ("b".to_string(), vec![1, 2]),
            ("a".to_string(), vec![3]),
            ("c".to_string(), vec![]),
        ];
        let got = pool.run_groups(groups, |_, items: Vec<i32>, _| items.iter().sum::<i32>());
        assert_eq!(
            got,
            vec![
                ("a".to_string(), Some(3)),
                ("b".to_string(), Some(3)),
                ("c".to_string(), Some(0)),
            ]
        );
    }

    #[test]
    fn concurrency_never_exceeds_the_bound() {
        let pool = WorkerPool::new(2, CancelFlag::new()).expect("pool");
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(Mutex::new(0usize));
        let groups = (0..8).map(|i| (format!("{i}"), ())).collect();

        let (r, p) = (running.clone(), peak.clone());
        pool.run_groups(groups, move |_, (), _| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut peak = p.lock().unwrap();
                *peak = (*peak).max(now);
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
            r.fetch_sub(1, Ordering::SeqCst);
        });

        assert!(*peak.lock().unwrap() <= 2);
    }

    #[test]
    fn cancel_flag_is_visible_to_workers() {
        let cancel = CancelFlag::new();
        let pool = WorkerPool::new(1, cancel.clone()).expect("pool");
        cancel.cancel();
        let got = pool.run_groups(vec![("a".to_string(), ())], |_, (), c| c.is_cancelled());
        assert_eq!(got, vec![("a".to_string(), Some(true))]);
    }

    #[test]
    fn panicking_group_yields_none() {
        let pool = WorkerPool::new(2, CancelFlag::new()).expect("pool");
        let got = pool.run_groups(
            vec![("ok".to_string(), false), ("boom".to_string(), true)],
            |_, panic: bool, _| {
                if panic {
                    panic!("worker exploded");
                }
                1
            },
        );
        assert_eq!(
            got,
            vec![("boom".to_string(), None), ("ok".to_string(), Some(1))]
        );
    }
}
