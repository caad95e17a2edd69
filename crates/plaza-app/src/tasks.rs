//! Page-scoped background tasks.

use std::future::Future;

use tokio::task::JoinHandle;

/// Tasks that belong to the current page: REST reads and periodic polls.
///
/// Navigation calls [`PageTasks::abort_all`], so nothing started for a page
/// outlives it. Dropping the set aborts everything too.
#[derive(Debug, Default)]
pub struct PageTasks {
    handles: Vec<JoinHandle<()>>,
}

impl PageTasks {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` as part of the current page.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());
        self.handles.push(tokio::spawn(future));
    }

    /// Abort every task of the page.
    pub fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Tasks still running.
    pub fn len(&self) -> usize {
        self.handles.iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Whether nothing is running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PageTasks {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn abort_stops_periodic_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = PageTasks::new();
        tasks.spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(30)).await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(rx.recv().await, Some(()));

        tasks.abort_all();
        assert!(tasks.is_empty());
        tokio::time::sleep(Duration::from_secs(120)).await;
        // Sender dropped with the aborted task
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn drop_aborts() {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        {
            let mut tasks = PageTasks::new();
            tasks.spawn(async move {
                std::future::pending::<()>().await;
                drop(tx);
            });
        }
        assert_eq!(rx.recv().await, None);
    }
}
