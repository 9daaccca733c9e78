/// Cancellable asset loading
///
/// A load runs as one local task on the host executor. The outcome travels
/// back over a oneshot channel that the viewer polls once per frame, so
/// closing the channel on `cancel()` is enough to guarantee that nothing is
/// delivered afterwards.
use futures::channel::oneshot;
use futures::future::{poll_fn, AbortHandle, Abortable, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use std::task::Poll;

use crate::asset::{prepare_model, AssetRef};
use crate::error::LoadError;
use crate::scene::{MaterialPolicy, ModelNode};

/// Monotonic load progress shared between a fetch and its request handle
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    value: Rc<Cell<f32>>,
}

impl ProgressSink {
    /// Record a fraction in [0, 1]. NaN and regressions are ignored.
    pub fn report(&self, fraction: f32) {
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction > self.value.get() {
            self.value.set(fraction);
            log::debug!("loading progress: {:.0}%", fraction * 100.0);
        }
    }

    /// Record progress from byte counts; unknown totals report nothing.
    pub fn report_bytes(&self, loaded: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|t| *t > 0) {
            self.report(loaded as f32 / total as f32);
        }
    }

    pub fn get(&self) -> f32 {
        self.value.get()
    }
}

/// Where asset bytes come from: disk, HTTP, memory
pub trait AssetSource {
    fn fetch(
        &self,
        asset: &AssetRef,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>>;
}

impl<T: AssetSource + ?Sized> AssetSource for Rc<T> {
    fn fetch(
        &self,
        asset: &AssetRef,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        (**self).fetch(asset, progress)
    }
}

/// Lifecycle of a [`LoadRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Completed,
    Cancelled,
}

type Outcome = Result<ModelNode, LoadError>;

/// Handle to one in-flight load
pub struct LoadRequest {
    asset: AssetRef,
    receiver: Option<oneshot::Receiver<Outcome>>,
    abort: AbortHandle,
    progress: ProgressSink,
    state: RequestState,
}

impl LoadRequest {
    pub fn asset(&self) -> &AssetRef {
        &self.asset
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    /// Take the outcome if the task has finished. Yields at most once.
    pub fn poll(&mut self) -> Option<Outcome> {
        if self.state != RequestState::Pending {
            return None;
        }
        let received = self.receiver.as_mut()?.try_recv();
        let outcome = match received {
            Ok(None) => return None,
            Ok(Some(outcome)) => outcome,
            // The task was dropped without sending: executor shut down or
            // the task never got spawned.
            Err(oneshot::Canceled) => Err(LoadError::Network(format!(
                "load of {} ended without a result",
                self.asset
            ))),
        };
        self.receiver = None;
        self.state = RequestState::Completed;
        Some(outcome)
    }

    /// Abort the task and close the channel. Returns `false` when the request
    /// had already completed or been cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.state != RequestState::Pending {
            return false;
        }
        self.abort.abort();
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
        }
        self.state = RequestState::Cancelled;
        log::debug!("cancelled load of {}", self.asset);
        true
    }
}

impl Drop for LoadRequest {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts fetch-and-decode tasks for one asset source
pub struct AssetLoader<Src> {
    source: Src,
}

impl<Src: AssetSource> AssetLoader<Src> {
    pub fn new(source: Src) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Src {
        &self.source
    }

    /// Spawn the load of `asset` on `spawner` and return its handle.
    pub fn load<Sp>(&self, asset: &AssetRef, policy: MaterialPolicy, spawner: &Sp) -> LoadRequest
    where
        Sp: LocalSpawn + ?Sized,
    {
        let progress = ProgressSink::default();
        let (sender, receiver) = oneshot::channel();
        let (abort, registration) = AbortHandle::new_pair();

        let fetch = self.source.fetch(asset, progress.clone());
        let task_asset = asset.clone();
        let task_progress = progress.clone();
        let task = async move {
            let outcome = match fetch.await {
                Ok(bytes) => {
                    task_progress.report(1.0);
                    prepare_model(&task_asset, &bytes, &policy)
                }
                Err(e) => Err(e),
            };
            // Fails only when the request was cancelled; the outcome is dropped.
            let _ = sender.send(outcome);
        };

        let abortable = Abortable::new(task, registration);
        if let Err(e) = spawner.spawn_local(async move {
            let _ = abortable.await;
        }) {
            // The dropped task closes the channel; poll() reports it.
            log::error!("could not spawn load of {}: {}", asset, e);
        }
        log::debug!("loading {}", asset);

        LoadRequest {
            asset: asset.clone(),
            receiver: Some(receiver),
            abort,
            progress,
            state: RequestState::Pending,
        }
    }
}

/// Give other tasks a turn on a cooperative executor.
pub fn yield_now() -> impl Future<Output = ()> {
    let mut yielded = false;
    poll_fn(move |cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use futures::FutureExt;

    /// Serves fixed bytes after one yield
    struct BytesSource(Result<Vec<u8>, LoadError>);

    impl AssetSource for BytesSource {
        fn fetch(
            &self,
            _asset: &AssetRef,
            progress: ProgressSink,
        ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
            let result = self.0.clone();
            async move {
                progress.report(0.5);
                yield_now().await;
                result
            }
            .boxed_local()
        }
    }

    fn cube_stl() -> Vec<u8> {
        let mesh = crate::geometry::Mesh::cube(1.0);
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
        for t in &mesh.triangles {
            data.extend_from_slice(&[0u8; 12]);
            for v in &t.vertices {
                for c in [v.position.x, v.position.y, v.position.z] {
                    data.extend_from_slice(&c.to_le_bytes());
                }
            }
            data.extend_from_slice(&[0, 0]);
        }
        data
    }

    #[test]
    fn test_progress_is_monotonic() {
        let sink = ProgressSink::default();
        sink.report(0.4);
        sink.report(0.2);
        sink.report(f32::NAN);
        assert_eq!(sink.get(), 0.4);
        sink.report(3.0);
        assert_eq!(sink.get(), 1.0);
        sink.report_bytes(10, None);
        assert_eq!(sink.get(), 1.0);
    }

    #[test]
    fn test_load_delivers_once() {
        let mut pool = LocalPool::new();
        let loader = AssetLoader::new(BytesSource(Ok(cube_stl())));
        let mut request = loader.load(&"cube.stl".into(), MaterialPolicy::AsAuthored, &pool.spawner());

        assert!(request.poll().is_none());
        pool.run_until_stalled();

        let model = request.poll().unwrap().unwrap();
        assert_eq!(model.triangle_count(), 12);
        assert_eq!(request.progress(), 1.0);
        assert_eq!(request.state(), RequestState::Completed);
        assert!(request.poll().is_none());
    }

    #[test]
    fn test_fetch_error_is_delivered() {
        let mut pool = LocalPool::new();
        let loader = AssetLoader::new(BytesSource(Err(LoadError::Network("404".into()))));
        let mut request = loader.load(&"x.glb".into(), MaterialPolicy::AsAuthored, &pool.spawner());
        pool.run_until_stalled();
        assert_eq!(request.poll(), Some(Err(LoadError::Network("404".into()))));
    }

    #[test]
    fn test_cancel_in_flight_suppresses_outcome() {
        let mut pool = LocalPool::new();
        let loader = AssetLoader::new(BytesSource(Ok(cube_stl())));
        let mut request = loader.load(&"cube.stl".into(), MaterialPolicy::AsAuthored, &pool.spawner());

        assert!(request.cancel());
        pool.run_until_stalled();
        assert!(request.poll().is_none());
        assert_eq!(request.state(), RequestState::Cancelled);
        assert!(!request.cancel());
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let mut pool = LocalPool::new();
        let loader = AssetLoader::new(BytesSource(Ok(cube_stl())));
        let mut request = loader.load(&"cube.stl".into(), MaterialPolicy::AsAuthored, &pool.spawner());
        pool.run_until_stalled();
        assert!(request.poll().unwrap().is_ok());
        assert!(!request.cancel());
        assert_eq!(request.state(), RequestState::Completed);
    }

    #[test]
    fn test_dropped_executor_reports_failure() {
        let pool = LocalPool::new();
        let loader = AssetLoader::new(BytesSource(Ok(cube_stl())));
        let mut request = loader.load(&"cube.stl".into(), MaterialPolicy::AsAuthored, &pool.spawner());
        drop(pool);
        assert!(matches!(request.poll(), Some(Err(LoadError::Network(_)))));
    }
}
